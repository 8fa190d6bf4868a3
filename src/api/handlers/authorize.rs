use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::sync::Arc;

use crate::commands::Envelope;
use crate::users::UserKey;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub identifier: String,
    #[serde(alias = "redirect_uri")]
    pub redirect_url: String,
    pub user_key: String,
}

/// `GET /?identifier=&user_key=&redirect_url=` -- the authorization callback.
///
/// Binds the user to the identifier and sends the browser back to the client.
/// A failed binding is answered with the usual envelope instead of a redirect.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AuthorizeParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected authorization callback");
            return Envelope::failure(format!("Invalid parameters: {}", e.body_text()))
                .into_response();
        }
    };

    let user_key = UserKey::from_text(&params.user_key);
    match state.engine.add_user_data(&params.identifier, &user_key) {
        Ok(()) => Redirect::to(&params.redirect_url).into_response(),
        Err(e) => Envelope::failure(e.to_string()).into_response(),
    }
}
