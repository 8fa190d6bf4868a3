use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::commands::Envelope;

// ============================================================================
// Command envelope
// ============================================================================

/// Failures are reported in-band, so every envelope is a 200.
impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Degraded,
    Ok,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    pub status: HealthStatus,
}

impl HealthResponse {
    pub fn ok(records: usize) -> (StatusCode, Json<HealthResponse>) {
        (
            StatusCode::OK,
            Json(HealthResponse {
                error: None,
                records: Some(records),
                status: HealthStatus::Ok,
            }),
        )
    }

    pub fn degraded(message: impl Into<String>) -> (StatusCode, Json<HealthResponse>) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                error: Some(message.into()),
                records: None,
                status: HealthStatus::Degraded,
            }),
        )
    }
}
