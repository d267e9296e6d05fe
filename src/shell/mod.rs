//! Application shell: loads, saves and deletes polygons through the API and
//! keeps the map canvas in sync. Map events drive a pending draft (the
//! metadata form) and a selection (the detail/delete panel).

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::{ClientError, PolygonApi};
use crate::map::{feature_id, MapCanvas, MapEvent};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("No drawn polygon is waiting to be saved")]
    NoDraft,

    #[error("No polygon is selected")]
    NoSelection,

    #[error("Selected polygon has no id")]
    MissingId,

    #[error(transparent)]
    Api(#[from] ClientError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    NotLoaded,
    Ready,
    /// Initial load failed; calling `load` again retries.
    Failed { message: String },
}

/// Form state for a drawn but unsaved polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub geometry: Geometry,
    pub attributes: JsonObject,
}

pub struct ApplicationShell<A: PolygonApi> {
    api: A,
    map: Arc<MapCanvas>,
    features: Vec<Feature>,
    load_state: LoadState,
    draft: Option<Draft>,
    selected: Option<Feature>,
}

impl<A: PolygonApi> ApplicationShell<A> {
    pub fn new(api: A, map: Arc<MapCanvas>) -> Self {
        Self {
            api,
            map,
            features: Vec::new(),
            load_state: LoadState::NotLoaded,
            draft: None,
            selected: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn selected(&self) -> Option<&Feature> {
        self.selected.as_ref()
    }

    /// Fetch all polygons and push them to the map.
    pub async fn load(&mut self) -> &LoadState {
        match self.api.list().await {
            Ok(collection) => {
                info!("Loaded {} polygons", collection.features.len());
                self.features = collection.features;
                self.push_down();
                self.load_state = LoadState::Ready;
            }
            Err(e) => {
                warn!("Loading polygons failed: {}", e);
                self.load_state = LoadState::Failed { message: e.to_string() };
            }
        }
        &self.load_state
    }

    pub fn handle_event(&mut self, event: MapEvent) {
        match event {
            MapEvent::PolygonDrawn(geometry) => {
                self.draft = Some(Draft {
                    geometry,
                    attributes: JsonObject::new(),
                });
            }
            MapEvent::FeatureSelected(feature) => {
                self.selected = Some(feature);
            }
        }
    }

    /// Apply every event the map has emitted so far.
    pub fn drain_events(&mut self, events: &mut mpsc::UnboundedReceiver<MapEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Save the pending draft. On failure the draft and the entered
    /// attributes stay in place so nothing typed is lost.
    pub async fn save(&mut self, attributes: JsonObject) -> Result<Feature, ShellError> {
        let draft = self.draft.as_mut().ok_or(ShellError::NoDraft)?;
        draft.attributes = attributes;

        let created = self.api.create(&draft.geometry, &draft.attributes).await?;

        self.draft = None;
        self.features.insert(0, created.clone());
        self.push_down();
        Ok(created)
    }

    /// Delete the selected polygon and drop it from the map.
    ///
    /// A 404 means someone else already deleted it, so the stale feature is
    /// dropped locally too before the error is returned.
    pub async fn delete_selected(&mut self) -> Result<String, ShellError> {
        let selected = self.selected.as_ref().ok_or(ShellError::NoSelection)?;
        let id = feature_id(selected).ok_or(ShellError::MissingId)?;

        match self.api.delete(&id).await {
            Ok(()) => {
                self.forget(&id);
                Ok(id)
            }
            Err(e @ ClientError::NotFound(_)) => {
                warn!("Polygon {} was already gone", id);
                self.forget(&id);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn forget(&mut self, id: &str) {
        self.clear_selection();
        self.features.retain(|f| feature_id(f).as_deref() != Some(id));
        self.push_down();
    }

    fn push_down(&self) {
        self.map.set_polygons(FeatureCollection {
            bbox: None,
            features: self.features.clone(),
            foreign_members: None,
        });
    }
}
