pub mod health;
pub mod status;

use crate::orchestration::IndexerStatus;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub network: String,
    pub status: Arc<IndexerStatus>,
}

impl AppState {
    pub fn new(network: impl Into<String>, status: Arc<IndexerStatus>) -> Self {
        Self {
            network: network.into(),
            status,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/status", get(status::get_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
