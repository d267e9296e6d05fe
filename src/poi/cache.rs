use geojson::{feature::Id, Feature, FeatureCollection};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, trace, warn};

use super::bounds::{BoundingBox, BoundsKey, DEFAULT_BOUNDS_PRECISION};
use super::client::PoiSource;

/// Cap on features requested per bbox query.
pub const DEFAULT_MAX_FEATURES: u32 = 1000;

/// Rendering-layer data source. Receives the full accumulated set on every
/// successful merge and computes its own diff.
pub trait FeatureSink: Send + Sync {
    fn set_data(&self, collection: FeatureCollection);
}

/// In-process layer data source that keeps the last published collection.
#[derive(Debug)]
pub struct LayerSource {
    data: RwLock<FeatureCollection>,
    publishes: AtomicUsize,
}

impl LayerSource {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(empty_collection()),
            publishes: AtomicUsize::new(0),
        }
    }

    pub fn data(&self) -> FeatureCollection {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of bulk replaces received so far.
    pub fn publish_count(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }
}

impl Default for LayerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSink for LayerSource {
    fn set_data(&self, collection: FeatureCollection) {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = collection;
        self.publishes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Result of a single `consider_bounds` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Bounds key was already queried; nothing was sent.
    Skipped,
    /// Fetch succeeded and was merged into the accumulated set.
    Merged { added: usize, duplicates: usize },
    /// Fetch failed; bounds stay unqueried so a later call retries.
    Failed,
}

/// Snapshot for loading indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoiStatus {
    pub loading: bool,
    pub count: usize,
    pub queried_tiles: usize,
    pub requests: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    queried: HashSet<BoundsKey>,
    features: Vec<Feature>,
    ids: HashSet<String>,
}

impl CacheState {
    fn merge(&mut self, incoming: Vec<Feature>) -> (usize, usize) {
        let mut added = 0;
        let mut duplicates = 0;

        for feature in incoming {
            match resolve_feature_id(&feature) {
                Some(id) if self.ids.contains(&id) => duplicates += 1,
                Some(id) => {
                    self.ids.insert(id);
                    self.features.push(feature);
                    added += 1;
                }
                // Nothing to collide on
                None => {
                    self.features.push(feature);
                    added += 1;
                }
            }
        }

        (added, duplicates)
    }

    fn collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.clone(),
            foreign_members: None,
        }
    }
}

/// Decrements the in-flight counter even if the fetch future is dropped.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Incremental POI loader for one map session.
///
/// Remembers which rounded bounding boxes have been fetched, accumulates the
/// returned features without duplicate identifiers, and republishes the whole
/// set to a [`FeatureSink`] after each successful merge.
///
/// Overlapping calls are not serialized: two in-flight fetches for the same
/// key both go to the network, and identifier dedup on merge keeps the
/// accumulated set correct.
pub struct ViewportTileCache {
    source: Arc<dyn PoiSource>,
    sink: Arc<dyn FeatureSink>,
    max_features: u32,
    precision: u32,
    state: Mutex<CacheState>,
    in_flight: AtomicUsize,
    requests: AtomicUsize,
}

impl ViewportTileCache {
    pub fn new(source: Arc<dyn PoiSource>, sink: Arc<dyn FeatureSink>) -> Self {
        Self {
            source,
            sink,
            max_features: DEFAULT_MAX_FEATURES,
            precision: DEFAULT_BOUNDS_PRECISION,
            state: Mutex::new(CacheState::default()),
            in_flight: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_max_features(mut self, max_features: u32) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch POIs for `bbox` unless its bounds key was already queried.
    pub async fn consider_bounds(&self, bbox: BoundingBox) -> FetchOutcome {
        let key = bbox.key(self.precision);
        if self.lock().queried.contains(&key) {
            trace!("POI bounds {} already queried", key);
            return FetchOutcome::Skipped;
        }

        let _loading = LoadingGuard::enter(&self.in_flight);
        self.requests.fetch_add(1, Ordering::SeqCst);

        let collection = match self.source.query(&bbox, self.max_features).await {
            Ok(collection) => collection,
            Err(e) => {
                warn!("POI fetch for {} failed: {}", key, e);
                return FetchOutcome::Failed;
            }
        };

        let (added, duplicates, snapshot) = {
            let mut state = self.lock();
            let (added, duplicates) = state.merge(collection.features);
            state.queried.insert(key.clone());
            (added, duplicates, state.collection())
        };

        debug!(
            "POI bounds {}: {} new, {} duplicate, {} total",
            key,
            added,
            duplicates,
            snapshot.features.len()
        );
        self.sink.set_data(snapshot);

        FetchOutcome::Merged { added, duplicates }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn is_queried(&self, bbox: &BoundingBox) -> bool {
        self.lock().queried.contains(&bbox.key(self.precision))
    }

    pub fn len(&self) -> usize {
        self.lock().features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the accumulated features, in insertion order.
    pub fn features(&self) -> FeatureCollection {
        self.lock().collection()
    }

    pub fn status(&self) -> PoiStatus {
        let state = self.lock();
        PoiStatus {
            loading: self.is_loading(),
            count: state.features.len(),
            queried_tiles: state.queried.len(),
            requests: self.requests.load(Ordering::SeqCst),
        }
    }
}

/// Stable identifier for a POI: `properties.id`, else the feature-level id.
pub fn resolve_feature_id(feature: &Feature) -> Option<String> {
    feature
        .properties
        .as_ref()
        .and_then(|props| props.get("id"))
        .and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| {
            feature.id.as_ref().map(|id| match id {
                Id::String(s) => s.clone(),
                Id::Number(n) => n.to_string(),
            })
        })
}

pub fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}
