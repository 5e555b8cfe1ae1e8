use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::{
    clients::{DiscordClient, FeedClient},
    config::Config,
    observability::metrics::Metrics,
    scheduler::CycleContext,
    store::seen::SeenStore,
    util::retry::RetryConfig,
};

pub mod fetch;
pub mod filter;
pub mod format;
pub mod publish;
pub mod summarize;

use fetch::{FeedFetchStage, FetchStage};
use filter::{FilterStage, SeenFilterStage};
use format::{DiscordFormatStage, FormatStage};
use publish::{PublishStage, WebhookPublishStage};
use summarize::{SummarizeStage, TfSummarizeStage};

/// 1サイクルの処理結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub fetched: usize,
    pub duplicates: usize,
    pub published: usize,
    pub failed: usize,
}

/// fetch → filter → summarize → format → publish を順に実行する。
pub struct PipelineOrchestrator {
    stages: PipelineStages,
    metrics: Arc<Metrics>,
}

struct PipelineStages {
    fetch: Arc<dyn FetchStage>,
    filter: Arc<dyn FilterStage>,
    summarize: Arc<dyn SummarizeStage>,
    format: Arc<dyn FormatStage>,
    publish: Arc<dyn PublishStage>,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn new(
        config: &Config,
        feed_client: Arc<FeedClient>,
        discord_client: Arc<DiscordClient>,
        seen_store: Arc<Mutex<SeenStore>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let retry_config = RetryConfig::new(
            config.http_max_retries(),
            config.http_backoff_base_ms(),
            config.http_backoff_cap_ms(),
        );
        let stages = PipelineStages {
            fetch: Arc::new(FeedFetchStage::new(
                feed_client,
                config.feeds().to_vec(),
                retry_config,
            )),
            filter: Arc::new(SeenFilterStage::new(seen_store)),
            summarize: Arc::new(TfSummarizeStage::new(config.summary_sentences())),
            format: Arc::new(DiscordFormatStage::new()),
            publish: Arc::new(WebhookPublishStage::new(
                discord_client,
                config.publish_pause(),
            )),
        };

        Self { stages, metrics }
    }

    /// パイプラインを1サイクル実行する。
    ///
    /// # Errors
    /// いずれかのステージが失敗した場合はエラーを返す。
    pub async fn execute(&self, cycle: &CycleContext) -> Result<CycleReport> {
        let started = std::time::Instant::now();

        let fetched = self.stages.fetch.fetch(cycle).await?;
        let fetched_count = fetched.articles.len();
        self.metrics.entries_fetched.inc_by(fetched_count as f64);

        let novel = self.stages.filter.filter(cycle, fetched).await?;
        let duplicates = novel.duplicates;
        self.metrics.duplicates_skipped.inc_by(duplicates as f64);

        let summarized = self.stages.summarize.summarize(cycle, novel).await?;
        let formatted = self.stages.format.format(cycle, summarized).await?;
        let report = self.stages.publish.publish(cycle, formatted).await?;

        self.metrics.articles_published.inc_by(report.published as f64);
        self.metrics.publish_failures.inc_by(report.failed as f64);
        self.metrics
            .cycle_duration
            .observe(started.elapsed().as_secs_f64());

        info!(
            cycle_id = %cycle.cycle_id,
            fetched = fetched_count,
            duplicates,
            published = report.published,
            failed = report.failed,
            "poll cycle pipeline finished"
        );

        Ok(CycleReport {
            cycle_id: cycle.cycle_id,
            fetched: fetched_count,
            duplicates,
            published: report.published,
            failed: report.failed,
        })
    }
}
