use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the indexer has bound the registry and restored its checkpoint.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    if !state.status.is_ready() {
        return Err(AppError::Unavailable("indexer is starting".into()));
    }
    Ok(Json(serde_json::json!({"status": "ready"})))
}
