//! Error types for asset loading.

use thiserror::Error;

/// Errors reported when an asset cannot be produced for a requested id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// The underlying resource does not exist (moved or deleted).
    ///
    /// This is the recoverable case routed through missing-resource resolution.
    #[error("Resource not found: {uri}")]
    NotFound { uri: String },

    #[error("Request failed for {id}: {reason}")]
    RequestFailed { id: String, reason: String },

    #[error("Missing plugin: {0}")]
    MissingPlugin(String),

    #[error("Invalid replacement URI: {0}")]
    InvalidReplacementUri(String),
}

impl AssetError {
    /// Shorthand for a failed request.
    pub fn request_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RequestFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error may be recovered by relocating the resource.
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = std::result::Result<T, AssetError>;
