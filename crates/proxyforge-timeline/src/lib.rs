//! ProxyForge Timeline - Timeline data model
//!
//! Implements the timeline structure the project edits:
//! - Timelines containing prioritized layers
//! - Layers containing clips bound to assets by id
//! - Commit generations so rebinding becomes observable
//! - Versioned timeline documents through formatters

pub mod clip;
pub mod error;
pub mod formatter;
pub mod layer;
pub mod timeline;

use parking_lot::RwLock;
use std::sync::Arc;

pub use clip::Clip;
pub use error::{TimelineError, TimelineResult};
pub use formatter::{AssetEntry, Formatter, JsonFormatter, TimelineFile};
pub use layer::Layer;
pub use timeline::Timeline;

/// A timeline shared between a project and its editors.
pub type SharedTimeline = Arc<RwLock<Timeline>>;

/// Wrap a timeline for sharing.
pub fn shared(timeline: Timeline) -> SharedTimeline {
    Arc::new(RwLock::new(timeline))
}
