use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct SeenStats {
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    oldest_seen_at: Option<DateTime<Utc>>,
}

/// 既出ストアの現在の統計を返す。
pub(crate) async fn stats(State(state): State<AppState>) -> Json<SeenStats> {
    let (count, oldest_seen_at) = state.poller().seen_stats().await;
    Json(SeenStats {
        count,
        oldest_seen_at,
    })
}
