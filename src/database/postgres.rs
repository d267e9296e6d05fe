use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geojson::Geometry;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, FromRow, PgPool};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::models::{NewPolygon, UserPolygon};
use super::store::{PolygonStore, StoreError};
use crate::config::DatabaseConfig;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

const RETURNING_COLUMNS: &str =
    "id, ST_AsGeoJSON(geom)::jsonb AS geometry, attributes, created_at, deleted_at";

#[derive(Debug, FromRow)]
struct PolygonRow {
    id: Uuid,
    geometry: Json<Value>,
    attributes: Json<Value>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PolygonRow> for UserPolygon {
    type Error = StoreError;

    fn try_from(row: PolygonRow) -> Result<Self, Self::Error> {
        let geometry: Geometry = serde_json::from_value(row.geometry.0)
            .map_err(|e| StoreError::Serialization(format!("polygon {} geometry: {}", row.id, e)))?;

        let attributes = match row.attributes.0 {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Serialization(format!(
                    "polygon {} attributes are not an object: {}",
                    row.id, other
                )))
            }
        };

        Ok(UserPolygon {
            id: row.id,
            geometry,
            attributes,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// PostGIS-backed polygon store.
#[derive(Debug, Clone)]
pub struct PgPolygonStore {
    pool: PgPool,
}

impl PgPolygonStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `config.url` and create the schema if needed.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;
        info!("Created database pool (max {} connections)", config.max_connections);

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        // Simple-query protocol so the multi-statement script runs as one batch
        (&self.pool).execute(SCHEMA_SQL).await?;
        Ok(())
    }
}

#[async_trait]
impl PolygonStore for PgPolygonStore {
    async fn list(&self) -> Result<Vec<UserPolygon>, StoreError> {
        let sql = format!(
            "SELECT {} FROM polygons WHERE deleted_at IS NULL ORDER BY created_at DESC",
            RETURNING_COLUMNS
        );
        let rows: Vec<PolygonRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(UserPolygon::try_from).collect()
    }

    async fn create(&self, polygon: NewPolygon) -> Result<UserPolygon, StoreError> {
        let geometry = serde_json::to_string(&polygon.geometry)
            .map_err(|e| StoreError::InvalidGeometry(e.to_string()))?;

        let sql = format!(
            "INSERT INTO polygons (id, geom, attributes) \
             VALUES ($1, ST_SetSRID(ST_GeomFromGeoJSON($2), 4326), $3) \
             RETURNING {}",
            RETURNING_COLUMNS
        );
        let row: PolygonRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(geometry)
            .bind(Json(Value::Object(polygon.attributes)))
            .fetch_one(&self.pool)
            .await?;

        let record = UserPolygon::try_from(row)?;
        info!("Created polygon {}", record.id);
        Ok(record)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE polygons SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!("Soft-deleted polygon {}", id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(geometry: Value, attributes: Value) -> PolygonRow {
        PolygonRow {
            id: Uuid::new_v4(),
            geometry: Json(geometry),
            attributes: Json(attributes),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn decodes_postgis_geojson_row() {
        let record = UserPolygon::try_from(row(
            json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]]}),
            json!({"name": "Field A"}),
        ))
        .unwrap();

        assert!(matches!(record.geometry.value, geojson::Value::Polygon(_)));
        assert_eq!(record.attributes.get("name"), Some(&json!("Field A")));
    }

    #[test]
    fn rejects_non_object_attributes_column() {
        let result = UserPolygon::try_from(row(
            json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]]}),
            json!([1, 2, 3]),
        ));
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn schema_declares_soft_delete_column() {
        assert!(SCHEMA_SQL.contains("deleted_at TIMESTAMPTZ"));
        assert!(SCHEMA_SQL.contains("geometry(Polygon, 4326)"));
    }
}
