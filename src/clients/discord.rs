/// Discord Webhookへの投稿クライアント。
///
/// 整形済み本文を `{"content": ...}` ペイロードとしてPOSTします。
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::debug;

/// Discordメッセージ本文の上限文字数。
pub const MESSAGE_CHAR_LIMIT: usize = 2000;

/// Webhookクライアントの設定。
#[derive(Debug, Clone)]
pub struct DiscordClientConfig {
    pub webhook_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Webhook経由でチャンネルに投稿するクライアント。
#[derive(Debug, Clone)]
pub struct DiscordClient {
    client: Client,
    webhook_url: Url,
}

impl DiscordClient {
    /// 新しいWebhookクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: &DiscordClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build discord HTTP client")?;

        let webhook_url =
            Url::parse(&config.webhook_url).context("invalid discord webhook URL")?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// 整形済み本文をチャンネルへ投稿する。
    ///
    /// # Errors
    /// リクエストが失敗した場合、またはWebhookがエラー状態を返した場合は
    /// エラーを返します。
    pub async fn post_message(&self, content: &str) -> Result<()> {
        let payload = WebhookPayload { content };

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await
            .context("discord webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("discord webhook returned error status {status}: {error_body}");
        }

        debug!(chars = content.chars().count(), "posted message to channel");
        Ok(())
    }

    /// Webhookの存在確認を行う。
    ///
    /// DiscordはWebhook URLへのGETでメタデータを返すため、到達性の
    /// 確認に使えます。
    ///
    /// # Errors
    /// リクエストが失敗した場合、またはエラー状態が返った場合はエラーを返します。
    pub async fn ping(&self) -> Result<()> {
        self.client
            .get(self.webhook_url.clone())
            .send()
            .await
            .context("discord webhook ping failed")?
            .error_for_status()
            .context("discord webhook ping returned error status")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base: &str) -> DiscordClientConfig {
        DiscordClientConfig {
            webhook_url: format!("{base}/api/webhooks/1/token"),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn post_message_sends_content_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/1/token"))
            .and(body_json(serde_json::json!({"content": "hello channel"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = DiscordClient::new(&test_config(&server.uri())).expect("client should build");

        client
            .post_message("hello channel")
            .await
            .expect("post should succeed");
    }

    #[tokio::test]
    async fn post_message_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/1/token"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = DiscordClient::new(&test_config(&server.uri())).expect("client should build");
        let result = client.post_message("hello").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ping_succeeds_for_ok_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/webhooks/1/token"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = DiscordClient::new(&test_config(&server.uri())).expect("client should build");

        client.ping().await.expect("ping should succeed");
    }
}
