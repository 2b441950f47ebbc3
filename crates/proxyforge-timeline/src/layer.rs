//! Layers: prioritized stacks of clips.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::clip::Clip;

/// A layer containing clips ordered by start position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique layer ID
    pub id: Uuid,
    /// Lower priorities are composited on top.
    pub priority: u32,
    clips: Vec<Clip>,
}

impl Layer {
    pub fn new(priority: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority,
            clips: Vec::new(),
        }
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Insert a clip, keeping clips sorted by start.
    pub fn add_clip(&mut self, clip: Clip) {
        let index = self.clips.partition_point(|c| c.start <= clip.start);
        self.clips.insert(index, clip);
    }

    /// Remove a clip by UUID. Returns the removed clip.
    pub fn remove_clip(&mut self, id: Uuid) -> Option<Clip> {
        let index = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(index))
    }

    /// Find a clip by UUID.
    pub fn find_clip(&self, id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// Rebind every clip playing `from` to `to`. Returns the number of clips changed.
    pub fn rebind_asset(&mut self, from: &str, to: &str) -> usize {
        self.clips
            .iter_mut()
            .filter(|c| c.asset_id() == from)
            .map(|c| c.rebind(to))
            .filter(|changed| *changed)
            .count()
    }

    /// End of the last clip.
    pub fn duration(&self) -> Duration {
        self.clips
            .iter()
            .map(Clip::end)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}
