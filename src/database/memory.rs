use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::models::{NewPolygon, UserPolygon};
use super::store::{PolygonStore, StoreError};

/// Process-local store, used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryPolygonStore {
    records: RwLock<Vec<UserPolygon>>,
}

impl MemoryPolygonStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolygonStore for MemoryPolygonStore {
    async fn list(&self) -> Result<Vec<UserPolygon>, StoreError> {
        let records = self.records.read().await;
        // Insertion order is creation order
        Ok(records.iter().rev().filter(|r| !r.is_deleted()).cloned().collect())
    }

    async fn create(&self, polygon: NewPolygon) -> Result<UserPolygon, StoreError> {
        let record = UserPolygon {
            id: Uuid::new_v4(),
            geometry: polygon.geometry,
            attributes: polygon.attributes,
            created_at: Utc::now(),
            deleted_at: None,
        };

        self.records.write().await.push(record.clone());
        info!("Created polygon {}", record.id);
        Ok(record)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id && !r.is_deleted())
            .ok_or(StoreError::NotFound(id))?;

        record.deleted_at = Some(Utc::now());
        info!("Soft-deleted polygon {}", id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn polygon(name: &str) -> NewPolygon {
        NewPolygon::from_json(
            &json!({"type": "Polygon", "coordinates": [[[0, 0], [0, 1], [1, 1], [1, 0], [0, 0]]]}),
            Some(&json!({ "name": name })),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = MemoryPolygonStore::new();
        store.create(polygon("first")).await.unwrap();
        store.create(polygon("second")).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.attributes["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("second"), json!("first")]);
    }

    #[tokio::test]
    async fn soft_delete_hides_record_and_rejects_repeat() {
        let store = MemoryPolygonStore::new();
        let record = store.create(polygon("doomed")).await.unwrap();

        store.soft_delete(record.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());

        assert!(matches!(
            store.soft_delete(record.id).await,
            Err(StoreError::NotFound(id)) if id == record.id
        ));
    }

    #[tokio::test]
    async fn soft_delete_unknown_id_is_not_found() {
        let store = MemoryPolygonStore::new();
        assert!(matches!(
            store.soft_delete(Uuid::new_v4()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
