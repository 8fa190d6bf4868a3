use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::api::response::HealthResponse;
use crate::AppState;

/// `GET /_internal/health`
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.engine.record_count() {
        Ok(records) => HealthResponse::ok(records),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not read the record store");
            HealthResponse::degraded(e.to_string())
        }
    }
}
