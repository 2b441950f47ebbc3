//! Clip types for the timeline.

use proxyforge_core::AssetKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A clip on a layer, bound to an asset by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Unique clip ID
    pub id: Uuid,
    /// Clip name (displayed in UI)
    pub name: String,
    /// Id of the asset the clip plays.
    asset_id: String,
    /// Kind of the bound asset
    pub kind: AssetKind,
    /// Position on the timeline
    pub start: Duration,
    /// Offset into the asset
    pub inpoint: Duration,
    /// Duration on timeline
    pub duration: Duration,
    /// Is clip enabled
    pub enabled: bool,
}

impl Clip {
    /// Create a new clip bound to `asset_id`.
    pub fn new(
        name: impl Into<String>,
        asset_id: impl Into<String>,
        kind: AssetKind,
        duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            asset_id: asset_id.into(),
            kind,
            start: Duration::ZERO,
            inpoint: Duration::ZERO,
            duration,
            enabled: true,
        }
    }

    /// Place the clip at `start`.
    pub fn at(mut self, start: Duration) -> Self {
        self.start = start;
        self
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// End position on the timeline.
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    /// Bind the clip to another asset. Returns false if already bound to it.
    pub fn rebind(&mut self, asset_id: impl Into<String>) -> bool {
        let asset_id = asset_id.into();
        if asset_id == self.asset_id {
            return false;
        }
        self.asset_id = asset_id;
        true
    }
}
