use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::{NewPolygon, UserPolygon};

/// Errors from polygon stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Attributes must be a JSON object")]
    InvalidAttributes,

    #[error("Attribute `{0}` is reserved")]
    ReservedAttribute(String),

    #[error("Polygon not found: {0}")]
    NotFound(Uuid),

    #[error("Stored record could not be decoded: {0}")]
    Serialization(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence for user-drawn polygons.
///
/// Records are create-only; deletion sets a soft-delete timestamp and hides
/// the record from `list`.
#[async_trait]
pub trait PolygonStore: Send + Sync {
    /// Non-deleted polygons, newest first.
    async fn list(&self) -> Result<Vec<UserPolygon>, StoreError>;

    async fn create(&self, polygon: NewPolygon) -> Result<UserPolygon, StoreError>;

    /// Fails with `NotFound` when the id is absent or already deleted.
    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn backend(&self) -> &'static str;
}
