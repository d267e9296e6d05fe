use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// `{"success": bool, "data": ...}` wrapper for non-GeoJSON endpoints.
///
/// `success` follows the status code, so a 503 health report still carries
/// its data but reads as unsuccessful.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status: StatusCode,
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    data: &'a T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    pub fn with_status(data: T, status: StatusCode) -> Self {
        Self { data, status }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            success: self.status.is_success(),
            data: &self.data,
        };
        (self.status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn render<T: Serialize>(response: ApiResponse<T>) -> (StatusCode, Value) {
        let response = response.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn success_wraps_data() {
        let (status, body) = render(ApiResponse::success(json!({ "authenticated": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "data": { "authenticated": true } }));
    }

    #[tokio::test]
    async fn error_status_marks_unsuccessful() {
        let (status, body) =
            render(ApiResponse::with_status(json!({ "status": "degraded" }), StatusCode::SERVICE_UNAVAILABLE)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["data"]["status"], json!("degraded"));
    }
}
