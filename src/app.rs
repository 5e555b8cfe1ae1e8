use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::Mutex;

use crate::{
    api,
    clients::{
        DiscordClient, FeedClient, discord::DiscordClientConfig, feed::FeedClientConfig,
    },
    config::Config,
    observability::Telemetry,
    pipeline::PipelineOrchestrator,
    scheduler::Poller,
    store::seen::SeenStore,
    util::time,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    poller: Poller,
    discord_client: Arc<DiscordClient>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn poller(&self) -> &Poller {
        &self.registry.poller
    }

    pub(crate) fn discord_client(&self) -> Arc<DiscordClient> {
        Arc::clone(&self.registry.discord_client)
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;
        let feed_client = Arc::new(
            FeedClient::new(&FeedClientConfig {
                user_agent: config.feed_user_agent().to_string(),
                connect_timeout: config.feed_connect_timeout(),
                total_timeout: config.feed_total_timeout(),
            })
            .context("failed to build feed client")?,
        );
        let discord_client = Arc::new(
            DiscordClient::new(&DiscordClientConfig {
                webhook_url: config.webhook_url().to_string(),
                timeout: config.webhook_timeout(),
            })
            .context("failed to build discord client")?,
        );
        let seen_store = Arc::new(Mutex::new(SeenStore::load(
            config.snapshot_path(),
            config.seen_retention(),
            config.similarity_threshold(),
            time::now(),
        )));
        let metrics = telemetry.metrics_arc();
        let pipeline = Arc::new(PipelineOrchestrator::new(
            &config,
            feed_client,
            Arc::clone(&discord_client),
            Arc::clone(&seen_store),
            Arc::clone(&metrics),
        ));
        let poller = Poller::new(pipeline, seen_store, metrics);

        Ok(Self {
            config,
            telemetry,
            poller,
            discord_client,
        })
    }

    #[must_use]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MUTEX;

    #[tokio::test]
    async fn component_registry_builds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let snapshot = dir.path().join("seen.json");

        let config = {
            let _lock = ENV_MUTEX.lock().expect("env mutex");
            // SAFETY: test code adjusts deterministic environment state sequentially.
            unsafe {
                std::env::set_var(
                    "DISCORD_WEBHOOK_URL",
                    "https://discord.test/api/webhooks/1/token",
                );
                std::env::set_var("FEED_URL", "https://rss.example.com/feed.xml");
                std::env::set_var(
                    "SEEN_SNAPSHOT_PATH",
                    snapshot.to_str().expect("utf-8 path"),
                );
                std::env::remove_var("FEEDS_CONFIG_PATH");
                std::env::remove_var("TITLE_SIMILARITY_THRESHOLD");
            }

            Config::from_env().expect("config loads")
        };

        let registry = ComponentRegistry::build(config).expect("registry builds");
        let state = AppState::new(registry);

        let _ = state.discord_client();
        let (count, oldest) = state.poller().seen_stats().await;
        assert_eq!(count, 0);
        assert!(oldest.is_none());
    }
}
