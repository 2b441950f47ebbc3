//! Timeline documents with versioning and migration.
//!
//! A [`Formatter`] reads and writes one timeline per document. The JSON
//! formatter stores a schema version field for forward-compatible persistence.

use proxyforge_core::{uri, AssetKind, AssetRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::error::{TimelineError, TimelineResult};
use crate::timeline::Timeline;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Reads and writes timeline documents.
pub trait Formatter: Send + Sync {
    /// Load the document at `uri` into `timeline`.
    ///
    /// Returns the assets the document references, in document order.
    fn load(&self, timeline: &mut Timeline, uri: &str) -> TimelineResult<Vec<AssetRequest>>;

    /// Write `timeline` to `uri`. Fails with [`TimelineError::AlreadyExists`]
    /// when a document exists and `overwrite` is false.
    fn save(&self, timeline: &Timeline, uri: &str, overwrite: bool) -> TimelineResult<()>;
}

/// Asset entry of a timeline document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub id: String,
    pub kind: AssetKind,
}

/// Versioned timeline file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct TimelineFile {
    /// Schema version for migration.
    pub version: u32,
    /// Assets referenced by the timeline.
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    pub timeline: Timeline,
    /// Application version that wrote this file.
    pub app_version: String,
}

impl TimelineFile {
    /// Create a new file from a timeline.
    pub fn new(timeline: Timeline) -> Self {
        let assets = timeline
            .asset_references()
            .into_iter()
            .map(|r| AssetEntry {
                id: r.id,
                kind: r.kind,
            })
            .collect();
        Self {
            version: CURRENT_VERSION,
            assets,
            timeline,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> TimelineResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| {
            TimelineError::Serialization(format!("Failed to serialize timeline: {}", e))
        })
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> TimelineResult<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| TimelineError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        if version > CURRENT_VERSION {
            return Err(TimelineError::Serialization(format!(
                "Timeline file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;

        let mut file: Self = serde_json::from_value(migrated).map_err(|e| {
            TimelineError::Serialization(format!("Failed to parse timeline: {}", e))
        })?;
        if file.assets.is_empty() {
            file.assets = file
                .timeline
                .asset_references()
                .into_iter()
                .map(|r| AssetEntry {
                    id: r.id,
                    kind: r.kind,
                })
                .collect();
        }
        Ok(file)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> TimelineResult<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 → v1: the entire value is the bare timeline
                if data.get("version").is_none() {
                    data = serde_json::json!({
                        "version": 1,
                        "timeline": data,
                        "app_version": "0.1.0",
                    });
                }
                version = 1;
            }
            _ => {
                return Err(TimelineError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}

/// Formatter for `file://` JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    fn path_of(location: &str) -> TimelineResult<PathBuf> {
        uri::file_uri_to_path(location)
            .ok_or_else(|| TimelineError::UnsupportedUri(location.to_string()))
    }
}

impl Formatter for JsonFormatter {
    fn load(&self, timeline: &mut Timeline, uri: &str) -> TimelineResult<Vec<AssetRequest>> {
        let path = Self::path_of(uri)?;
        let data = std::fs::read(&path)?;
        let file = TimelineFile::from_json(&data)?;
        debug!(uri = %uri, version = file.version, assets = file.assets.len(), "Loaded timeline document");

        timeline.replace_contents(file.timeline);
        Ok(file
            .assets
            .into_iter()
            .map(|a| AssetRequest::new(a.id, a.kind))
            .collect())
    }

    fn save(&self, timeline: &Timeline, uri: &str, overwrite: bool) -> TimelineResult<()> {
        let path = Self::path_of(uri)?;
        if path.exists() && !overwrite {
            return Err(TimelineError::AlreadyExists(uri.to_string()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = TimelineFile::new(timeline.clone()).to_json()?;
        std::fs::write(&path, data)?;
        debug!(uri = %uri, "Saved timeline document");
        Ok(())
    }
}
