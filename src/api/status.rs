//! Indexer progress.

use crate::api::AppState;
use crate::orchestration::StatusSnapshot;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub network: String,
    pub ready: bool,
    pub finished: bool,
    pub failed: bool,
    pub last_block: u64,
    pub events_processed: u64,
    pub events_skipped: u64,
    pub clock_ticks: u64,
}

impl StatusResponse {
    fn new(network: String, snapshot: StatusSnapshot) -> Self {
        StatusResponse {
            network,
            ready: snapshot.ready,
            finished: snapshot.finished,
            failed: snapshot.failed,
            last_block: snapshot.last_block,
            events_processed: snapshot.events_processed,
            events_skipped: snapshot.events_skipped,
            clock_ticks: snapshot.clock_ticks,
        }
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::new(
        state.network.clone(),
        state.status.snapshot(),
    ))
}
