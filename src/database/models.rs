use chrono::{DateTime, Utc};
use geojson::{feature::Id, Feature, Geometry, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::store::StoreError;

/// A user-drawn polygon as persisted by the feature store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPolygon {
    pub id: Uuid,
    pub geometry: Geometry,
    pub attributes: JsonObject,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserPolygon {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// GeoJSON feature with attributes merged into `properties`, plus the
    /// record's `id` and `created_at`. Those two keys are reserved, so
    /// `NewPolygon::from_json` never lets an attribute shadow them.
    pub fn to_feature(&self) -> Feature {
        let mut properties = self.attributes.clone();
        properties.insert("id".to_string(), Value::String(self.id.to_string()));
        properties.insert("created_at".to_string(), Value::String(self.created_at.to_rfc3339()));

        Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: Some(Id::String(self.id.to_string())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Validated input for `PolygonStore::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPolygon {
    pub geometry: Geometry,
    pub attributes: JsonObject,
}

/// Property names filled in from the record itself when rendering a feature.
pub const RESERVED_ATTRIBUTES: [&str; 2] = ["id", "created_at"];

impl NewPolygon {
    /// Build from raw request JSON. Missing or null attributes become `{}`.
    pub fn from_json(geometry: &Value, attributes: Option<&Value>) -> Result<Self, StoreError> {
        let geometry = parse_polygon(geometry)?;
        let attributes = match attributes {
            None | Some(Value::Null) => JsonObject::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(StoreError::InvalidAttributes),
        };
        if let Some(key) = RESERVED_ATTRIBUTES.iter().find(|key| attributes.contains_key(**key)) {
            return Err(StoreError::ReservedAttribute(key.to_string()));
        }
        Ok(Self { geometry, attributes })
    }
}

/// Parse a GeoJSON geometry and require a non-empty `Polygon`.
pub fn parse_polygon(value: &Value) -> Result<Geometry, StoreError> {
    let kind = value.get("type").and_then(Value::as_str);
    if kind != Some("Polygon") {
        return Err(StoreError::InvalidGeometry(format!(
            "geometry type must be Polygon, got {}",
            kind.unwrap_or("nothing")
        )));
    }
    if value.get("coordinates").map_or(true, Value::is_null) {
        return Err(StoreError::InvalidGeometry("geometry coordinates are required".to_string()));
    }

    let geometry: Geometry = serde_json::from_value(value.clone())
        .map_err(|e| StoreError::InvalidGeometry(format!("malformed geometry: {}", e)))?;
    validate_polygon(&geometry)?;
    Ok(geometry)
}

/// Rings must be closed and hold at least four 2D positions. The PostGIS
/// column is 2D, so a third ordinate is refused here rather than by the insert.
pub fn validate_polygon(geometry: &Geometry) -> Result<(), StoreError> {
    let rings = match &geometry.value {
        geojson::Value::Polygon(rings) => rings,
        other => {
            return Err(StoreError::InvalidGeometry(format!(
                "geometry type must be Polygon, got {}",
                geometry_kind(other)
            )))
        }
    };

    if rings.is_empty() {
        return Err(StoreError::InvalidGeometry("polygon has no rings".to_string()));
    }

    for (i, ring) in rings.iter().enumerate() {
        if ring.len() < 4 {
            return Err(StoreError::InvalidGeometry(format!(
                "ring {} needs at least 4 positions, got {}",
                i,
                ring.len()
            )));
        }
        if let Some(position) = ring.iter().find(|position| position.len() != 2) {
            return Err(StoreError::InvalidGeometry(format!(
                "ring {} position must have exactly 2 coordinates, got {}",
                i,
                position.len()
            )));
        }
        if ring.first() != ring.last() {
            return Err(StoreError::InvalidGeometry(format!("ring {} is not closed", i)));
        }
    }

    Ok(())
}

fn geometry_kind(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
