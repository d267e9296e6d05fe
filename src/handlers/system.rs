// handlers/system.rs - Public health and map configuration endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;

use crate::middleware::ApiResponse;
use crate::server::AppState;

/// Client-side map settings. The POI threshold and base URL drive the overlay.
#[derive(Debug, Clone, Serialize)]
pub struct MapSettings {
    pub center: [f64; 2],
    pub zoom: f64,
    pub poi_min_zoom: f64,
    pub poi_service_url: Option<String>,
    pub poi_max_features: u32,
}

/// GET /api/map-config
pub async fn map_config(State(state): State<AppState>) -> ApiResponse<MapSettings> {
    let config = &state.config;
    ApiResponse::success(MapSettings {
        center: [config.map.default_lng, config.map.default_lat],
        zoom: config.map.default_zoom,
        poi_min_zoom: config.map.poi_min_zoom,
        poi_service_url: config.poi_enabled().then(|| config.poi.base_url.clone()),
        poi_max_features: config.poi.max_features,
    })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "store": state.store.backend(),
        })),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            ApiResponse::with_status(
                json!({
                    "status": "degraded",
                    "timestamp": now,
                    "store": state.store.backend(),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    }
}
