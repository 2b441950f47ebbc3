//! Error types for project operations.

use proxyforge_core::AssetError;
use proxyforge_media::MediaError;
use proxyforge_timeline::TimelineError;
use thiserror::Error;

use crate::proxy::ProxyState;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error("No encoding profile configured for {0}")]
    NoProxyProfile(String),

    /// The project already runs a transcode job.
    #[error("A transcode job is already active")]
    JobActive,

    #[error("No transcode job is active")]
    NoActiveJob,

    #[error("Cannot {operation} while proxy creation is {state}")]
    InvalidState {
        operation: &'static str,
        state: ProxyState,
    },

    /// A proxy was offered for an asset that is not loaded.
    #[error("Parent asset not loaded: {0}")]
    ParentNotLoaded(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Project URI already set to {0}")]
    UriAlreadySet(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for project operations.
pub type ProjectResult<T> = std::result::Result<T, ProjectError>;
