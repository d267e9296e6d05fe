//! Headless map canvas: the viewport-facing half of the map component.
//!
//! Feeds viewport-settle events into the POI tile cache (above the zoom
//! threshold only), holds the user polygon collection pushed down by the
//! application shell, and emits drawing/selection events upward.

use geojson::{feature::Id, Feature, FeatureCollection, Geometry};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::database::models::validate_polygon;
use crate::database::StoreError;
use crate::poi::{
    cache::empty_collection, BoundingBox, FeatureSink, FetchOutcome, PoiError, PoiStatus, ViewportTileCache,
    WfsPoiClient,
};

/// Map view after a pan/zoom gesture settles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: BoundingBox,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// User finished drawing a polygon.
    PolygonDrawn(Geometry),
    /// User clicked one of their saved polygons.
    FeatureSelected(Feature),
}

pub struct MapCanvas {
    tiles: Option<Arc<ViewportTileCache>>,
    poi_min_zoom: f64,
    viewport: Mutex<Option<Viewport>>,
    polygons: RwLock<FeatureCollection>,
    events: mpsc::UnboundedSender<MapEvent>,
}

impl MapCanvas {
    /// `tiles` is `None` when the POI overlay is disabled.
    pub fn new(tiles: Option<Arc<ViewportTileCache>>, poi_min_zoom: f64) -> (Self, mpsc::UnboundedReceiver<MapEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let canvas = Self {
            tiles,
            poi_min_zoom,
            viewport: Mutex::new(None),
            polygons: RwLock::new(empty_collection()),
            events,
        };
        (canvas, receiver)
    }

    /// Build a canvas wired to the configured WFS service, publishing POIs to `sink`.
    pub fn from_config(
        config: &AppConfig,
        sink: Arc<dyn FeatureSink>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MapEvent>), PoiError> {
        let tiles = if config.poi_enabled() {
            let source = WfsPoiClient::from_config(&config.poi)?;
            let cache = ViewportTileCache::new(Arc::new(source), sink)
                .with_max_features(config.poi.max_features)
                .with_precision(config.poi.bounds_precision);
            Some(Arc::new(cache))
        } else {
            None
        };
        Ok(Self::new(tiles, config.map.poi_min_zoom))
    }

    pub fn poi_min_zoom(&self) -> f64 {
        self.poi_min_zoom
    }

    pub fn viewport(&self) -> Option<Viewport> {
        *self.viewport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the settled viewport and load POIs for it when zoomed in far enough.
    ///
    /// Returns `None` when nothing was considered (overlay disabled or zoom
    /// below the threshold).
    pub async fn on_viewport_settle(&self, viewport: Viewport) -> Option<FetchOutcome> {
        *self.viewport.lock().unwrap_or_else(PoisonError::into_inner) = Some(viewport);

        let tiles = self.tiles.as_ref()?;
        if viewport.zoom < self.poi_min_zoom {
            trace!("Zoom {} below POI threshold {}", viewport.zoom, self.poi_min_zoom);
            return None;
        }

        Some(tiles.consider_bounds(viewport.bounds).await)
    }

    /// Replace the rendered user polygons.
    pub fn set_polygons(&self, collection: FeatureCollection) {
        debug!("Map now shows {} polygons", collection.features.len());
        *self.polygons.write().unwrap_or_else(PoisonError::into_inner) = collection;
    }

    pub fn polygons(&self) -> FeatureCollection {
        self.polygons.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Finish a drawing gesture. Only polygons are accepted.
    pub fn draw_polygon(&self, geometry: Geometry) -> Result<(), StoreError> {
        validate_polygon(&geometry)?;
        self.emit(MapEvent::PolygonDrawn(geometry));
        Ok(())
    }

    /// Select a rendered polygon by id. Returns false when no such polygon is shown.
    pub fn select_feature(&self, id: &str) -> bool {
        let found = self
            .polygons
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .features
            .iter()
            .find(|f| feature_id(f).as_deref() == Some(id))
            .cloned();

        match found {
            Some(feature) => {
                self.emit(MapEvent::FeatureSelected(feature));
                true
            }
            None => false,
        }
    }

    /// Loading indicator and POI count for the UI.
    pub fn poi_status(&self) -> PoiStatus {
        match &self.tiles {
            Some(tiles) => tiles.status(),
            None => PoiStatus {
                loading: false,
                count: 0,
                queried_tiles: 0,
                requests: 0,
            },
        }
    }

    pub fn tiles(&self) -> Option<&Arc<ViewportTileCache>> {
        self.tiles.as_ref()
    }

    fn emit(&self, event: MapEvent) {
        if self.events.send(event).is_err() {
            debug!("Map event dropped: no listener");
        }
    }
}

/// Record id of a saved polygon feature.
pub fn feature_id(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) => Some(s.clone()),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => feature
            .properties
            .as_ref()
            .and_then(|p| p.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poi::cache::tests::{poi, ScriptedSource};
    use crate::poi::LayerSource;
    use serde_json::json;

    fn canvas_with(source: Arc<ScriptedSource>, min_zoom: f64) -> (MapCanvas, mpsc::UnboundedReceiver<MapEvent>) {
        let cache = ViewportTileCache::new(source, Arc::new(LayerSource::new()));
        MapCanvas::new(Some(Arc::new(cache)), min_zoom)
    }

    fn square() -> Geometry {
        serde_json::from_value(json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [0, 1], [1, 1], [1, 0], [0, 0]]]
        }))
        .unwrap()
    }

    fn viewport(zoom: f64) -> Viewport {
        Viewport {
            bounds: BoundingBox::new(-0.13, 51.50, -0.12, 51.51),
            zoom,
        }
    }

    #[tokio::test]
    async fn below_threshold_never_fetches() {
        let source = Arc::new(ScriptedSource::new(|_| Ok(vec![poi("a")])));
        let (canvas, _events) = canvas_with(source.clone(), 14.0);

        assert_eq!(canvas.on_viewport_settle(viewport(13.9)).await, None);
        assert_eq!(canvas.on_viewport_settle(viewport(3.0)).await, None);
        assert_eq!(source.calls(), 0);
        assert_eq!(canvas.viewport(), Some(viewport(3.0)));
    }

    #[tokio::test]
    async fn at_threshold_fetches() {
        let source = Arc::new(ScriptedSource::new(|_| Ok(vec![poi("a")])));
        let (canvas, _events) = canvas_with(source.clone(), 14.0);

        assert_eq!(
            canvas.on_viewport_settle(viewport(14.0)).await,
            Some(FetchOutcome::Merged { added: 1, duplicates: 0 })
        );
        assert_eq!(canvas.on_viewport_settle(viewport(16.0)).await, Some(FetchOutcome::Skipped));
        assert_eq!(source.calls(), 1);
        assert_eq!(canvas.poi_status().count, 1);
    }

    #[tokio::test]
    async fn disabled_overlay_reports_empty_status() {
        let (canvas, _events) = MapCanvas::new(None, 14.0);
        assert_eq!(canvas.on_viewport_settle(viewport(18.0)).await, None);
        assert_eq!(canvas.poi_status().count, 0);
        assert!(!canvas.poi_status().loading);
    }

    #[tokio::test]
    async fn draw_emits_polygon_event() {
        let (canvas, mut events) = MapCanvas::new(None, 14.0);

        canvas.draw_polygon(square()).unwrap();
        assert_eq!(events.recv().await, Some(MapEvent::PolygonDrawn(square())));

        let line: Geometry = serde_json::from_value(json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]})).unwrap();
        assert!(canvas.draw_polygon(line).is_err());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn select_emits_feature_event_for_known_ids() {
        let (canvas, mut events) = MapCanvas::new(None, 14.0);
        let feature = Feature {
            bbox: None,
            geometry: Some(square()),
            id: Some(Id::String("abc".to_string())),
            properties: json!({"name": "Field A"}).as_object().cloned(),
            foreign_members: None,
        };
        canvas.set_polygons(FeatureCollection {
            bbox: None,
            features: vec![feature.clone()],
            foreign_members: None,
        });

        assert!(canvas.select_feature("abc"));
        assert_eq!(events.recv().await, Some(MapEvent::FeatureSelected(feature)));
        assert!(!canvas.select_feature("missing"));
    }

    #[test]
    fn disabled_config_builds_canvas_without_tiles() {
        let config = AppConfig::development();
        let (canvas, _events) = MapCanvas::from_config(&config, Arc::new(LayerSource::new())).unwrap();
        assert!(canvas.tiles().is_none());
        assert_eq!(canvas.poi_min_zoom(), config.map.poi_min_zoom);
    }
}
