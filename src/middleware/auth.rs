use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::auth::{token_from_headers, verify_token};
use crate::error::ApiError;
use crate::server::AppState;

/// Session guard for API routes: 401 JSON when the cookie is missing or invalid
pub async fn require_api_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match token_from_headers(request.headers()) {
        None => Err(ApiError::unauthorized("Missing session cookie")),
        Some(token) if !verify_token(&state.config, &token) => {
            debug!("Rejected invalid session token for {}", request.uri().path());
            Err(ApiError::unauthorized("Invalid or expired session"))
        }
        Some(_) => Ok(next.run(request).await),
    }
}

/// Session guard for UI pages: redirect to the login form instead of erroring
pub async fn require_page_session(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authenticated = token_from_headers(request.headers())
        .map(|token| verify_token(&state.config, &token))
        .unwrap_or(false);

    if authenticated {
        next.run(request).await
    } else {
        Redirect::to("/login").into_response()
    }
}
