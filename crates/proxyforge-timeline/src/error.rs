//! Error types for timelines and their documents.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Saving without `overwrite` onto an existing document.
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// The timeline is bound to a different project.
    #[error("Timeline belongs to another project: {0}")]
    NotOwned(String),

    #[error("Unsupported document location: {0}")]
    UnsupportedUri(String),
}

/// Result type alias for timeline operations.
pub type TimelineResult<T> = std::result::Result<T, TimelineError>;
