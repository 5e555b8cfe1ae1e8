use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use crate::{clients::DiscordClient, scheduler::CycleContext};

use super::format::FormattedBatch;

/// 投稿結果の集計。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub cycle_id: Uuid,
    pub published: usize,
    pub failed: usize,
}

#[async_trait]
pub trait PublishStage: Send + Sync {
    async fn publish(&self, cycle: &CycleContext, batch: FormattedBatch) -> Result<PublishReport>;
}

/// Webhook経由でメッセージを順番に投稿するステージ。
///
/// 1件の失敗は記録して続行する。連続投稿の間には
/// レート制限回避のための待機を挟む。
pub struct WebhookPublishStage {
    client: Arc<DiscordClient>,
    pause: Duration,
}

impl WebhookPublishStage {
    pub fn new(client: Arc<DiscordClient>, pause: Duration) -> Self {
        Self { client, pause }
    }
}

#[async_trait]
impl PublishStage for WebhookPublishStage {
    async fn publish(&self, cycle: &CycleContext, batch: FormattedBatch) -> Result<PublishReport> {
        let mut published = 0;
        let mut failed = 0;
        let total = batch.messages.len();

        for (index, message) in batch.messages.iter().enumerate() {
            match self.client.post_message(&message.body).await {
                Ok(()) => {
                    info!(
                        cycle_id = %cycle.cycle_id,
                        title = %message.title,
                        "posted article"
                    );
                    published += 1;
                }
                Err(err) => {
                    error!(
                        cycle_id = %cycle.cycle_id,
                        title = %message.title,
                        error = %err,
                        "failed to post article"
                    );
                    failed += 1;
                }
            }

            if index + 1 < total && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        Ok(PublishReport {
            cycle_id: batch.cycle_id,
            published,
            failed,
        })
    }
}
