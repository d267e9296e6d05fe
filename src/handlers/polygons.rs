// handlers/polygons.rs - /api/polygons collection and record handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use geojson::{Feature, FeatureCollection};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::database::NewPolygon;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePolygonRequest {
    pub geometry: Value,
    #[serde(default)]
    pub attributes: Option<Value>,
}

/// GET /api/polygons - All non-deleted polygons as a GeoJSON FeatureCollection, newest first
pub async fn list(State(state): State<AppState>) -> Result<Json<FeatureCollection>, ApiError> {
    let records = state.store.list().await?;

    Ok(Json(FeatureCollection {
        bbox: None,
        features: records.iter().map(|r| r.to_feature()).collect(),
        foreign_members: None,
    }))
}

/// POST /api/polygons - Create a polygon
///
/// Expected Input:
/// ```json
/// {
///   "geometry": { "type": "Polygon", "coordinates": [[[0,0],[0,1],[1,1],[1,0],[0,0]]] },
///   "attributes": { "name": "Field A" }
/// }
/// ```
///
/// Returns 201 with the created GeoJSON Feature; 400 when the geometry is not a
/// closed Polygon or attributes is not an object.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreatePolygonRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Feature>), ApiError> {
    let Json(payload) = payload?;
    let polygon = NewPolygon::from_json(&payload.geometry, payload.attributes.as_ref())?;

    let record = state.store.create(polygon).await?;
    Ok((StatusCode::CREATED, Json(record.to_feature())))
}

/// DELETE /api/polygons/:id - Soft delete; 404 when absent or already deleted
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::not_found(format!("Polygon {} not found", id)))?;

    state.store.soft_delete(id).await?;
    info!("Polygon {} deleted via API", id);
    Ok(StatusCode::NO_CONTENT)
}
