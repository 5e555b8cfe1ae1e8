use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::{
    scheduler::CycleContext,
    store::seen::SeenStore,
    util::text::{normalize_title, normalize_url},
    util::time,
};

use super::fetch::{Article, FetchedBatch};

/// 重複除去後の新規記事。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelBatch {
    pub cycle_id: Uuid,
    pub articles: Vec<Article>,
    pub duplicates: usize,
}

#[async_trait]
pub trait FilterStage: Send + Sync {
    async fn filter(&self, cycle: &CycleContext, batch: FetchedBatch) -> Result<NovelBatch>;
}

/// 既出記事ストアと照合して重複を落とすステージ。
///
/// 受理した記事はその場でストアに記録する。同一サイクル内の
/// 類似記事もこれにより弾かれる。
pub struct SeenFilterStage {
    store: Arc<Mutex<SeenStore>>,
}

impl SeenFilterStage {
    pub fn new(store: Arc<Mutex<SeenStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FilterStage for SeenFilterStage {
    async fn filter(&self, cycle: &CycleContext, batch: FetchedBatch) -> Result<NovelBatch> {
        let mut articles = Vec::with_capacity(batch.articles.len());
        let mut duplicates = 0;
        let mut store = self.store.lock().await;

        for article in batch.articles {
            let url = normalize_url(&article.url);
            let title = normalize_title(&article.title);
            let now = time::now();

            if store.is_duplicate(&url, &title, now) {
                debug!(
                    cycle_id = %cycle.cycle_id,
                    title = %article.title,
                    "skipping duplicate article"
                );
                duplicates += 1;
                continue;
            }

            store.record(url, title, now);
            articles.push(article);
        }

        Ok(NovelBatch {
            cycle_id: batch.cycle_id,
            articles,
            duplicates,
        })
    }
}
