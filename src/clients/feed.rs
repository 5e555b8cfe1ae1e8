/// RSS/Atomフィードの取得クライアント。
///
/// タイムアウトとUser-Agentを設定したHTTPクライアントでフィードを取得し、
/// feed-rsでパースします。
use std::time::Duration;

use anyhow::{Context, Result};
use feed_rs::model::Feed;
use reqwest::Client;
use tracing::debug;

/// フィードクライアントの設定。
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

/// フィード取得とパースを担うクライアント。
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    /// 新しいフィードクライアントを作成する。
    ///
    /// # Errors
    /// HTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: &FeedClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build feed HTTP client")?;

        Ok(Self { client })
    }

    /// フィードを取得してパースする。
    ///
    /// # Errors
    /// HTTPリクエストの失敗、エラーステータス、またはフィードの
    /// パースに失敗した場合はエラーを返します。
    pub async fn fetch(&self, url: &str) -> Result<Feed> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("feed request failed for {url}"))?
            .error_for_status()
            .with_context(|| format!("feed endpoint returned error status for {url}"))?;

        let bytes = response
            .bytes()
            .await
            .context("failed to read feed response body")?;

        debug!(url, bytes = bytes.len(), "fetched feed document");

        feed_rs::parser::parse(bytes.as_ref())
            .with_context(|| format!("failed to parse feed document from {url}"))
    }
}
