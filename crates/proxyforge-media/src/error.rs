//! Error types for the media subsystem.

use thiserror::Error;

/// Errors raised while building or running a transcode pipeline.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The pipeline could not be built, could not start, or failed while running.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// The job was cancelled before it finished.
    #[error("Transcode cancelled")]
    Cancelled,

    /// The requested operation needs a running pipeline.
    #[error("No running pipeline")]
    NotRunning,

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for media operations.
pub type MediaResult<T> = std::result::Result<T, MediaError>;
