//! ProxyForge Core - Foundation types for asset management
//!
//! This crate provides the types shared by every other ProxyForge crate:
//! - Asset identity, kind tags and kind filters
//! - The asset capability contract (`AssetLoader`) consumed by projects
//! - Asset loading errors
//! - URI helpers for file-backed resources

pub mod asset;
pub mod error;
pub mod loader;
pub mod uri;

pub use asset::{Asset, AssetKind, AssetMetadata, AssetState, KindFilter};
pub use error::{AssetError, AssetResult};
pub use loader::{AssetLoader, AssetRequest, Completion, IdUpdate};

/// Suffix appended to an original URI to name its proxy.
pub const PROXY_SUFFIX: &str = ".proxy";

/// Suffix carried by a proxy file while it is still being encoded.
pub const PART_SUFFIX: &str = ".part";
