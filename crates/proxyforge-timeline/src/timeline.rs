//! Timelines and their commit generations.

use proxyforge_core::AssetRequest;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::clip::Clip;
use crate::layer::Layer;

/// A timeline containing layers of clips.
///
/// Edits are staged until [`Timeline::commit`] makes them observable, which
/// bumps the commit generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Unique timeline ID
    pub id: Uuid,
    /// Timeline name
    pub name: String,
    layers: Vec<Layer>,
    /// Id of the project the timeline is bound to.
    #[serde(skip)]
    project: Option<String>,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    dirty: bool,
}

impl Timeline {
    /// Create an empty timeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            layers: Vec::new(),
            project: None,
            generation: 0,
            dirty: false,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The layer with `priority`, created if missing.
    pub fn layer_mut(&mut self, priority: u32) -> &mut Layer {
        self.dirty = true;
        let index = match self.layers.binary_search_by_key(&priority, |l| l.priority) {
            Ok(index) => index,
            Err(index) => {
                self.layers.insert(index, Layer::new(priority));
                index
            }
        };
        &mut self.layers[index]
    }

    /// Add a clip on the layer with `priority`.
    pub fn add_clip(&mut self, priority: u32, clip: Clip) -> Uuid {
        let id = clip.id;
        self.layer_mut(priority).add_clip(clip);
        id
    }

    /// Remove a clip from whichever layer holds it.
    pub fn remove_clip(&mut self, id: Uuid) -> Option<Clip> {
        let removed = self.layers.iter_mut().find_map(|l| l.remove_clip(id));
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Find a clip by UUID across all layers.
    pub fn find_clip(&self, id: Uuid) -> Option<&Clip> {
        self.layers.iter().find_map(|l| l.find_clip(id))
    }

    /// All clips, layer by layer.
    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.layers.iter().flat_map(|l| l.clips().iter())
    }

    /// Assets referenced by clips, first reference first, without duplicates.
    pub fn asset_references(&self) -> Vec<AssetRequest> {
        let mut refs: Vec<AssetRequest> = Vec::new();
        for clip in self.clips() {
            if !refs.iter().any(|r| r.id == clip.asset_id()) {
                refs.push(AssetRequest::new(clip.asset_id(), clip.kind));
            }
        }
        refs
    }

    /// Rebind every clip playing `from` to `to`, on every layer.
    pub fn rebind_asset(&mut self, from: &str, to: &str) -> usize {
        let changed: usize = self
            .layers
            .iter_mut()
            .map(|l| l.rebind_asset(from, to))
            .sum();
        if changed > 0 {
            self.dirty = true;
        }
        changed
    }

    /// Publish staged edits. Returns false when there was nothing to commit.
    pub fn commit(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.generation += 1;
        true
    }

    /// Number of commits that published changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    /// Id of the owning project.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn set_project(&mut self, project: Option<String>) {
        self.project = project;
    }

    /// Take name and layers from a loaded document; identity and ownership stay.
    pub fn replace_contents(&mut self, loaded: Timeline) {
        self.name = loaded.name;
        self.layers = loaded.layers;
        self.dirty = true;
    }

    /// Get the total duration of the timeline.
    pub fn duration(&self) -> Duration {
        self.layers
            .iter()
            .map(Layer::duration)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new("Timeline 1")
    }
}
