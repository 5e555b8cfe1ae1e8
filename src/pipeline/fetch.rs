use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{
    clients::FeedClient,
    config::FeedSource,
    scheduler::CycleContext,
    util::retry::{RetryConfig, is_retryable_error},
    util::text::{strip_html, truncate_chars},
};

/// 表示するタイトルの上限文字数。
const TITLE_MAX_CHARS: usize = 250;
/// 要約の素材として保持する本文の上限文字数。
const BODY_MAX_CHARS: usize = 1000;

/// 取得済み記事。本文はHTML除去・NFC正規化済み。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub source: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBatch {
    pub cycle_id: Uuid,
    pub articles: Vec<Article>,
}

#[async_trait]
pub trait FetchStage: Send + Sync {
    async fn fetch(&self, cycle: &CycleContext) -> Result<FetchedBatch>;
}

/// 設定された全フィードから記事候補を取得するステージ。
pub struct FeedFetchStage {
    client: Arc<FeedClient>,
    sources: Vec<FeedSource>,
    retry_config: RetryConfig,
}

impl FeedFetchStage {
    pub fn new(client: Arc<FeedClient>, sources: Vec<FeedSource>, retry_config: RetryConfig) -> Self {
        Self {
            client,
            sources,
            retry_config,
        }
    }

    /// 再試行付きでフィードを取得する。
    async fn fetch_with_retry(&self, url: &str) -> Result<feed_rs::model::Feed> {
        let mut attempt = 0;

        loop {
            match self.client.fetch(url).await {
                Ok(feed) => {
                    if attempt > 0 {
                        info!(attempt, url, "feed fetch succeeded after retry");
                    }
                    return Ok(feed);
                }
                Err(err) => {
                    attempt += 1;

                    if !self.retry_config.can_retry(attempt) {
                        warn!(
                            attempt,
                            max_attempts = self.retry_config.max_attempts,
                            url,
                            "feed fetch failed after all retries"
                        );
                        return Err(err);
                    }

                    let is_retryable = err
                        .downcast_ref::<reqwest::Error>()
                        .is_some_and(is_retryable_error);

                    if !is_retryable {
                        warn!(?err, url, "feed error is not retryable");
                        return Err(err);
                    }

                    let delay = self.retry_config.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        url,
                        "feed fetch failed, retrying after delay"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl FetchStage for FeedFetchStage {
    async fn fetch(&self, cycle: &CycleContext) -> Result<FetchedBatch> {
        let mut articles = Vec::new();

        for source in &self.sources {
            let feed = match self.fetch_with_retry(&source.url).await {
                Ok(feed) => feed,
                Err(error) => {
                    // 片方のフィードが落ちていても残りは処理する
                    warn!(
                        cycle_id = %cycle.cycle_id,
                        source = %source.name,
                        error = %error,
                        "skipping unreachable feed"
                    );
                    continue;
                }
            };

            if feed.entries.is_empty() {
                warn!(
                    cycle_id = %cycle.cycle_id,
                    source = %source.name,
                    "feed returned no entries"
                );
                continue;
            }

            info!(
                cycle_id = %cycle.cycle_id,
                source = %source.name,
                entries = feed.entries.len(),
                "fetched feed"
            );

            // 古い記事から新しい記事の順で処理する
            for entry in feed.entries.into_iter().rev() {
                if let Some(article) = convert_entry(&source.name, entry) {
                    articles.push(article);
                }
            }
        }

        Ok(FetchedBatch {
            cycle_id: cycle.cycle_id,
            articles,
        })
    }
}

/// フィードのエントリを記事に変換する。リンクが無いエントリはNoneを返す。
fn convert_entry(source: &str, entry: feed_rs::model::Entry) -> Option<Article> {
    let title_raw = entry
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "No title".to_string());

    let url = entry
        .links
        .into_iter()
        .map(|link| link.href)
        .find(|href| !href.is_empty());
    let Some(url) = url else {
        warn!(title = %title_raw, "entry missing link, skipping");
        return None;
    };

    let published_at = entry.published.or(entry.updated);

    let body_html = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();
    let body: String = strip_html(&body_html).nfc().collect();

    Some(Article {
        source: source.to_string(),
        title: truncate_chars(title_raw.trim(), TITLE_MAX_CHARS).to_string(),
        url,
        published_at,
        summary_source: truncate_chars(&body, BODY_MAX_CHARS).to_string(),
    })
}
