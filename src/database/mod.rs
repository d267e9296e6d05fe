pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

use std::sync::Arc;
use tracing::{info, warn};

pub use memory::MemoryPolygonStore;
pub use models::{parse_polygon, NewPolygon, UserPolygon};
pub use postgres::PgPolygonStore;
pub use store::{PolygonStore, StoreError};

use crate::config::DatabaseConfig;

/// PostGIS when a database URL is configured, otherwise in-memory.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn PolygonStore>, StoreError> {
    match config.url.as_deref() {
        Some(url) => {
            let store = PgPolygonStore::connect(url, config).await?;
            info!("Using PostGIS polygon store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; polygons are kept in memory and lost on restart");
            Ok(Arc::new(MemoryPolygonStore::new()))
        }
    }
}
