// handlers/auth.rs - POST/DELETE /api/auth shared-password session handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::auth::{clear_session_cookie, issue_token, password_matches, session_cookie};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// POST /api/auth - Exchange the shared password for a session cookie
///
/// Expected Input:
/// ```json
/// { "password": "string" }
/// ```
///
/// On success sets an HTTP-only signed session cookie valid for the configured
/// number of days and returns `{"success": true, ...}`. Wrong password is 401.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }

    if !password_matches(&state.config, &payload.password) {
        warn!("Rejected login with wrong shared password");
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let token = issue_token(&state.config).map_err(|e| {
        error!("Failed to issue session token: {}", e);
        ApiError::internal("Could not create session")
    })?;

    info!("Issued session token");
    let cookie = session_cookie(&state.config, &token);
    let body = ApiResponse::success(json!({
        "authenticated": true,
        "expires_in": state.config.session_max_age(),
    }));

    Ok(([(header::SET_COOKIE, cookie)], body))
}

/// DELETE /api/auth - Clear the session cookie
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(&state.config))],
    )
}
