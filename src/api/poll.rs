use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::{app::AppState, scheduler::CycleContext};

#[derive(Debug, Serialize)]
struct TriggerPollResponse {
    cycle_id: Uuid,
    status: &'static str,
}

/// ポーリングサイクルを即時に1回起動する。
///
/// サイクルはバックグラウンドで実行され、受理応答を即座に返す。
pub(crate) async fn trigger(State(state): State<AppState>) -> impl IntoResponse {
    let cycle = CycleContext::new();
    let cycle_id = cycle.cycle_id;
    let poller = state.poller().clone();

    tokio::spawn(async move {
        if let Err(error) = poller.run_cycle(cycle).await {
            error!(%cycle_id, error = ?error, "manual poll cycle failed");
        } else {
            info!(%cycle_id, "manual poll cycle completed");
        }
    });

    let body = Json(TriggerPollResponse {
        cycle_id,
        status: "accepted",
    });

    (StatusCode::ACCEPTED, body).into_response()
}
