use axum::body::Bytes;
use axum::extract::State;
use serde_json::Value;
use std::sync::Arc;

use crate::commands::{self, Envelope};
use crate::AppState;

// ============================================================================
// Handlers
// ============================================================================

/// `POST /api` -- run the command named in the JSON body.
///
/// Even an unreadable body is answered with an envelope.
pub async fn command(State(state): State<Arc<AppState>>, body: Bytes) -> Envelope {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected unparseable command body");
            return Envelope::failure(format!("Invalid parameters: {e}"));
        }
    };

    commands::dispatch(&state.engine, body)
}
