// HTTP-facing errors for the polygon API
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::database::StoreError;

/// Error returned by handlers and guards. `Display` is the client-safe message;
/// internal causes are logged at the conversion site and never rendered.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Request body parsed but a field failed validation.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    InvalidJson(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    /// Stable machine-readable code for clients.
    pub fn error_code(&self) -> &'static str {
        self.parts().1
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::InvalidJson(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR"),
        }
    }

    /// `{"success": false, "error", "code"}`, plus `field_errors` for validation failures.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "code": self.error_code(),
        });
        if let ApiError::Validation { field, message } = self {
            body["field_errors"] = json!({ *field: message });
        }
        body
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidGeometry(reason) => ApiError::validation("geometry", reason),
            StoreError::InvalidAttributes => ApiError::validation("attributes", "Attributes must be a JSON object"),
            err @ StoreError::ReservedAttribute(_) => ApiError::validation("attributes", err.to_string()),
            StoreError::NotFound(id) => ApiError::not_found(format!("Polygon {} not found", id)),
            StoreError::Serialization(reason) => {
                tracing::error!("Stored polygon could not be decoded: {}", reason);
                ApiError::internal("An error occurred while processing your request")
            }
            StoreError::Sqlx(sqlx_err) => {
                tracing::error!("Database error: {}", sqlx_err);
                ApiError::internal("Database error occurred")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidJson(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
