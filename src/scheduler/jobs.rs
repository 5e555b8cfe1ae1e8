use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    observability::metrics::Metrics,
    pipeline::{CycleReport, PipelineOrchestrator},
    store::seen::SeenStore,
    util::time,
};

/// 1回のポーリングサイクルを識別するコンテキスト。
#[derive(Debug, Clone, Copy)]
pub struct CycleContext {
    pub cycle_id: Uuid,
}

impl CycleContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
        }
    }
}

impl Default for CycleContext {
    fn default() -> Self {
        Self::new()
    }
}

/// パイプライン実行とスナップショット保存をまとめるハンドル。
#[derive(Clone)]
pub struct Poller {
    pipeline: Arc<PipelineOrchestrator>,
    store: Arc<Mutex<SeenStore>>,
    metrics: Arc<Metrics>,
}

impl Poller {
    pub fn new(
        pipeline: Arc<PipelineOrchestrator>,
        store: Arc<Mutex<SeenStore>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            store,
            metrics,
        }
    }

    /// ポーリングサイクルを1回実行する。
    ///
    /// 成功時は既出ストアのスナップショットを書き出す。保存の失敗は
    /// 警告にとどめ、サイクル自体の結果には影響させない。
    ///
    /// # Errors
    /// パイプラインの実行が失敗した場合はエラーを返す。
    pub async fn run_cycle(&self, cycle: CycleContext) -> Result<CycleReport> {
        tracing::info!(cycle_id = %cycle.cycle_id, "running poll cycle");

        match self.pipeline.execute(&cycle).await {
            Ok(report) => {
                self.metrics.cycles_completed.inc();

                let store = self.store.lock().await;
                self.metrics.seen_records.set(store.len() as f64);
                if let Err(error) = store.save() {
                    tracing::warn!(
                        cycle_id = %cycle.cycle_id,
                        error = %error,
                        "failed to save seen snapshot"
                    );
                }

                Ok(report)
            }
            Err(e) => {
                self.metrics.cycles_failed.inc();
                tracing::error!(cycle_id = %cycle.cycle_id, error = %e, "poll cycle failed");
                Err(e)
            }
        }
    }

    /// スナップショットを明示的に書き出す（シャットダウン時など）。
    ///
    /// # Errors
    /// ファイル書き込みに失敗した場合はエラーを返す。
    pub async fn save_snapshot(&self) -> Result<()> {
        self.store.lock().await.save()
    }

    /// 既出ストアの統計を返す（件数と最古の記録時刻）。
    pub async fn seen_stats(&self) -> (usize, Option<DateTime<Utc>>) {
        let mut store = self.store.lock().await;
        store.evict_expired(time::now());
        (store.len(), store.oldest_seen_at())
    }
}
