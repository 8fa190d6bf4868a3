use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Command facade -- the command name travels in the body
    let api_routes = Router::new()
        .route("/", get(handlers::authorize))
        .route("/api", post(handlers::command));

    // Internal routes -- operational probes
    let internal_routes = Router::new().route("/_internal/health", get(handlers::health));

    Router::new()
        .merge(api_routes)
        .merge(internal_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
