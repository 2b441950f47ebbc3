//! Project configuration.

use proxyforge_core::{uri, PART_SUFFIX, PROXY_SUFFIX};
use proxyforge_media::EncodingProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ProjectError, ProjectResult};

/// Settings governing proxy generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Directory URI proxies are written to. `None` writes them next to
    /// their originals.
    pub proxies_location: Option<String>,
    /// Project-wide profile. Bulk proxy creation needs one.
    pub proxy_profile: Option<EncodingProfile>,
    pub proxy_suffix: String,
    /// Suffix carried by outputs while they are encoded.
    pub part_suffix: String,
    /// Default bound for [`crate::Project::wait_idle`], in milliseconds.
    pub idle_timeout_ms: u64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            proxies_location: None,
            proxy_profile: None,
            proxy_suffix: PROXY_SUFFIX.to_string(),
            part_suffix: PART_SUFFIX.to_string(),
            idle_timeout_ms: 30_000,
        }
    }
}

impl ProjectSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> ProjectResult<Self> {
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data)
            .map_err(|e| ProjectError::Config(format!("Failed to parse settings: {}", e)))
    }

    /// Save settings to a JSON file.
    pub fn save(&self, path: &Path) -> ProjectResult<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| ProjectError::Config(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Set where proxies are written. Accepts a URI or a filesystem path.
    pub fn set_proxies_location(&mut self, location: Option<&str>) -> ProjectResult<()> {
        let location = location.ok_or_else(|| ProjectError::InvalidUri("<none>".into()))?;
        if location.is_empty() {
            return Err(ProjectError::InvalidUri(location.to_string()));
        }
        let location = uri::to_uri(location);
        if !uri::is_valid_uri(&location) {
            return Err(ProjectError::InvalidUri(location));
        }
        self.proxies_location = Some(location);
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// URI a proxy of `original` is written to.
    ///
    /// The proxy suffix is appended to the original name; with a proxies
    /// location the file moves there, keeping its name.
    pub fn proxy_uri_for(&self, original: &str) -> String {
        let name = format!("{}{}", uri::basename(original), self.proxy_suffix);
        match &self.proxies_location {
            Some(dir) => uri::join(dir, &name),
            None => format!("{}{}", uri::directory(original), name),
        }
    }
}
