use std::{env, net::SocketAddr, num::NonZeroUsize, path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// 監視対象のフィード1件。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct FeedsFile {
    feeds: Vec<FeedSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    webhook_url: String,
    feeds: Vec<FeedSource>,
    fetch_interval: Duration,
    similarity_threshold: f64,
    summary_sentences: NonZeroUsize,
    seen_retention_hours: u32,
    snapshot_path: PathBuf,
    feed_user_agent: String,
    feed_connect_timeout: Duration,
    feed_total_timeout: Duration,
    webhook_timeout: Duration,
    publish_pause: Duration,
    http_max_retries: usize,
    http_backoff_base_ms: u64,
    http_backoff_cap_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数からボットの設定値を読み込み、検証する。
    ///
    /// フィード一覧は `FEEDS_CONFIG_PATH` のYAMLファイル、無ければ
    /// `FEED_URL` / `FEED_SOURCE_NAME` から解決する。
    ///
    /// # Errors
    /// `DISCORD_WEBHOOK_URL` が未設定、フィードが解決できない、
    /// もしくは各種値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let webhook_url = env_var("DISCORD_WEBHOOK_URL")?;
        let http_bind = parse_socket_addr("COURIER_HTTP_BIND", "0.0.0.0:9105")?;
        let feeds = resolve_feeds()?;

        let fetch_interval = parse_duration_secs("FETCH_INTERVAL_SECS", 300)?;
        let similarity_threshold = parse_ratio("TITLE_SIMILARITY_THRESHOLD", 0.85)?;
        let summary_sentences = parse_non_zero_usize("SUMMARY_SENTENCES", 5)?;
        let seen_retention_hours = parse_u32("SEEN_RETENTION_HOURS", 24)?;
        let snapshot_path = PathBuf::from(
            env::var("SEEN_SNAPSHOT_PATH").unwrap_or_else(|_| "seen_articles.json".to_string()),
        );

        let feed_user_agent = env::var("FEED_USER_AGENT")
            .unwrap_or_else(|_| "Mozilla/5.0 (compatible; feed-courier/0.1)".to_string());
        let feed_connect_timeout = parse_duration_ms("FEED_CONNECT_TIMEOUT_MS", 3000)?;
        let feed_total_timeout = parse_duration_ms("FEED_TOTAL_TIMEOUT_MS", 20_000)?;
        let webhook_timeout = parse_duration_ms("WEBHOOK_TIMEOUT_MS", 10_000)?;
        let publish_pause = parse_duration_ms("PUBLISH_PAUSE_MS", 2000)?;

        // Retry settings (exponential backoff + jitter)
        let http_max_retries = parse_usize("HTTP_MAX_RETRIES", 3)?;
        let http_backoff_base_ms = parse_u64("HTTP_BACKOFF_BASE_MS", 250)?;
        let http_backoff_cap_ms = parse_u64("HTTP_BACKOFF_CAP_MS", 10_000)?;

        Ok(Self {
            http_bind,
            webhook_url,
            feeds,
            fetch_interval,
            similarity_threshold,
            summary_sentences,
            seen_retention_hours,
            snapshot_path,
            feed_user_agent,
            feed_connect_timeout,
            feed_total_timeout,
            webhook_timeout,
            publish_pause,
            http_max_retries,
            http_backoff_base_ms,
            http_backoff_cap_ms,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    #[must_use]
    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    #[must_use]
    pub fn fetch_interval(&self) -> Duration {
        self.fetch_interval
    }

    #[must_use]
    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    #[must_use]
    pub fn summary_sentences(&self) -> NonZeroUsize {
        self.summary_sentences
    }

    #[must_use]
    pub fn seen_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.seen_retention_hours))
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &std::path::Path {
        &self.snapshot_path
    }

    #[must_use]
    pub fn feed_user_agent(&self) -> &str {
        &self.feed_user_agent
    }

    #[must_use]
    pub fn feed_connect_timeout(&self) -> Duration {
        self.feed_connect_timeout
    }

    #[must_use]
    pub fn feed_total_timeout(&self) -> Duration {
        self.feed_total_timeout
    }

    #[must_use]
    pub fn webhook_timeout(&self) -> Duration {
        self.webhook_timeout
    }

    #[must_use]
    pub fn publish_pause(&self) -> Duration {
        self.publish_pause
    }

    #[must_use]
    pub fn http_max_retries(&self) -> usize {
        self.http_max_retries
    }

    #[must_use]
    pub fn http_backoff_base_ms(&self) -> u64 {
        self.http_backoff_base_ms
    }

    #[must_use]
    pub fn http_backoff_cap_ms(&self) -> u64 {
        self.http_backoff_cap_ms
    }
}

fn resolve_feeds() -> Result<Vec<FeedSource>, ConfigError> {
    if let Ok(path) = env::var("FEEDS_CONFIG_PATH") {
        let contents =
            std::fs::read_to_string(&path).map_err(|error| ConfigError::Invalid {
                name: "FEEDS_CONFIG_PATH",
                source: anyhow::Error::new(error),
            })?;
        let file: FeedsFile =
            serde_yaml::from_str(&contents).map_err(|error| ConfigError::Invalid {
                name: "FEEDS_CONFIG_PATH",
                source: anyhow::Error::new(error),
            })?;
        if file.feeds.is_empty() {
            return Err(ConfigError::Invalid {
                name: "FEEDS_CONFIG_PATH",
                source: anyhow::anyhow!("feeds file must list at least one feed"),
            });
        }
        return Ok(file.feeds);
    }

    let url = env_var("FEED_URL")?;
    let name = env::var("FEED_SOURCE_NAME").unwrap_or_else(|_| "news".to_string());
    Ok(vec![FeedSource { name, url }])
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_ms)?;
    Ok(Duration::from_millis(value))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_ratio(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be between 0.0 and 1.0"),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests run sequentially under ENV_MUTEX and assign valid UTF-8 values.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn remove_env(name: &str) {
        // SAFETY: tests run sequentially under ENV_MUTEX and clean up deterministic keys.
        unsafe {
            env::remove_var(name);
        }
    }

    fn reset_env() {
        remove_env("DISCORD_WEBHOOK_URL");
        remove_env("COURIER_HTTP_BIND");
        remove_env("FEEDS_CONFIG_PATH");
        remove_env("FEED_URL");
        remove_env("FEED_SOURCE_NAME");
        remove_env("FETCH_INTERVAL_SECS");
        remove_env("TITLE_SIMILARITY_THRESHOLD");
        remove_env("SUMMARY_SENTENCES");
        remove_env("SEEN_RETENTION_HOURS");
        remove_env("SEEN_SNAPSHOT_PATH");
        remove_env("FEED_USER_AGENT");
        remove_env("FEED_CONNECT_TIMEOUT_MS");
        remove_env("FEED_TOTAL_TIMEOUT_MS");
        remove_env("WEBHOOK_TIMEOUT_MS");
        remove_env("PUBLISH_PAUSE_MS");
        remove_env("HTTP_MAX_RETRIES");
        remove_env("HTTP_BACKOFF_BASE_MS");
        remove_env("HTTP_BACKOFF_CAP_MS");
    }

    #[test]
    fn from_env_uses_defaults_when_optional_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/t");
        set_env("FEED_URL", "https://rss.example.com/feed.xml");

        let config = Config::from_env().expect("config should load");

        assert_eq!(
            config.webhook_url(),
            "https://discord.test/api/webhooks/1/t"
        );
        assert_eq!(config.http_bind(), "0.0.0.0:9105".parse().unwrap());
        assert_eq!(config.feeds().len(), 1);
        assert_eq!(config.feeds()[0].name, "news");
        assert_eq!(config.fetch_interval(), Duration::from_secs(300));
        assert!((config.similarity_threshold() - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.summary_sentences().get(), 5);
        assert_eq!(config.seen_retention(), chrono::Duration::hours(24));
        assert_eq!(
            config.snapshot_path(),
            std::path::Path::new("seen_articles.json")
        );
        assert_eq!(config.feed_total_timeout(), Duration::from_millis(20_000));
        assert_eq!(config.publish_pause(), Duration::from_millis(2000));
        assert_eq!(config.http_max_retries(), 3);
    }

    #[test]
    fn from_env_overrides_values() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/2/u");
        set_env("FEED_URL", "https://rss.example.com/world.xml");
        set_env("FEED_SOURCE_NAME", "World Desk");
        set_env("COURIER_HTTP_BIND", "127.0.0.1:8088");
        set_env("FETCH_INTERVAL_SECS", "60");
        set_env("TITLE_SIMILARITY_THRESHOLD", "0.9");
        set_env("SUMMARY_SENTENCES", "3");
        set_env("SEEN_RETENTION_HOURS", "48");
        set_env("PUBLISH_PAUSE_MS", "500");

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.feeds()[0].name, "World Desk");
        assert_eq!(config.http_bind(), "127.0.0.1:8088".parse().unwrap());
        assert_eq!(config.fetch_interval(), Duration::from_secs(60));
        assert!((config.similarity_threshold() - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.summary_sentences().get(), 3);
        assert_eq!(config.seen_retention(), chrono::Duration::hours(48));
        assert_eq!(config.publish_pause(), Duration::from_millis(500));
    }

    #[test]
    fn from_env_errors_when_webhook_missing() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("FEED_URL", "https://rss.example.com/feed.xml");

        let error = Config::from_env().expect_err("missing webhook should fail");

        assert!(matches!(error, ConfigError::Missing("DISCORD_WEBHOOK_URL")));
    }

    #[test]
    fn from_env_errors_when_no_feed_configured() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/t");

        let error = Config::from_env().expect_err("missing feed should fail");

        assert!(matches!(error, ConfigError::Missing("FEED_URL")));
    }

    #[test]
    fn from_env_rejects_threshold_out_of_range() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/t");
        set_env("FEED_URL", "https://rss.example.com/feed.xml");
        set_env("TITLE_SIMILARITY_THRESHOLD", "1.5");

        let error = Config::from_env().expect_err("out-of-range threshold should fail");

        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "TITLE_SIMILARITY_THRESHOLD",
                ..
            }
        ));
    }

    #[test]
    fn feeds_file_overrides_single_feed_env() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "feeds:\n  - name: Ground News\n    url: https://rss.example.com/ground.xml\n  - name: Wire\n    url: https://rss.example.com/wire.xml"
        )
        .expect("write feeds file");

        set_env("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/t");
        set_env(
            "FEEDS_CONFIG_PATH",
            file.path().to_str().expect("utf-8 path"),
        );

        let config = Config::from_env().expect("config should load");

        assert_eq!(config.feeds().len(), 2);
        assert_eq!(config.feeds()[0].name, "Ground News");
        assert_eq!(config.feeds()[1].url, "https://rss.example.com/wire.xml");
    }

    #[test]
    fn empty_feeds_file_is_rejected() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "feeds: []").expect("write feeds file");

        set_env("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/t");
        set_env(
            "FEEDS_CONFIG_PATH",
            file.path().to_str().expect("utf-8 path"),
        );

        let error = Config::from_env().expect_err("empty feeds file should fail");

        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: "FEEDS_CONFIG_PATH",
                ..
            }
        ));
    }
}
