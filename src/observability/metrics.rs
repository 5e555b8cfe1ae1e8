/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    pub entries_fetched: Counter,
    pub duplicates_skipped: Counter,
    pub articles_published: Counter,
    pub publish_failures: Counter,
    pub cycles_completed: Counter,
    pub cycles_failed: Counter,
    pub cycle_duration: Histogram,
    pub seen_records: Gauge,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// メトリクスの登録に失敗した場合はエラーを返す。
    pub fn new(registry: &Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            entries_fetched: register_counter_with_registry!(
                "courier_entries_fetched_total",
                "Total number of feed entries fetched",
                registry
            )?,
            duplicates_skipped: register_counter_with_registry!(
                "courier_duplicates_skipped_total",
                "Total number of entries dropped as duplicates",
                registry
            )?,
            articles_published: register_counter_with_registry!(
                "courier_articles_published_total",
                "Total number of articles posted to the channel",
                registry
            )?,
            publish_failures: register_counter_with_registry!(
                "courier_publish_failures_total",
                "Total number of failed channel posts",
                registry
            )?,
            cycles_completed: register_counter_with_registry!(
                "courier_cycles_completed_total",
                "Total number of completed poll cycles",
                registry
            )?,
            cycles_failed: register_counter_with_registry!(
                "courier_cycles_failed_total",
                "Total number of failed poll cycles",
                registry
            )?,
            cycle_duration: register_histogram_with_registry!(
                "courier_cycle_duration_seconds",
                "Poll cycle duration in seconds",
                registry
            )?,
            seen_records: register_gauge_with_registry!(
                "courier_seen_records",
                "Number of records currently retained in the seen store",
                registry
            )?,
        })
    }
}
