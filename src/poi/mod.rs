//! Point-of-interest overlay: bbox keys, the remote feature service client,
//! and the incremental viewport tile cache.

pub mod bounds;
pub mod cache;
pub mod client;

pub use bounds::{BoundingBox, BoundsKey, DEFAULT_BOUNDS_PRECISION};
pub use cache::{
    resolve_feature_id, FeatureSink, FetchOutcome, LayerSource, PoiStatus, ViewportTileCache,
    DEFAULT_MAX_FEATURES,
};
pub use client::{PoiError, PoiSource, WfsPoiClient};
