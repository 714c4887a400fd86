//! Error types for the sync engine library
//!
//! Only failures that make a run impossible live here. Per-user create and
//! delete failures are counted in the summary instead.

use std::path::PathBuf;
use sync_core::DirectoryError;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The directory user list could not be fetched
    #[error("Failed to list directory users: {0}")]
    Listing(#[source] DirectoryError),

    /// CSV decoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Local file could not be read
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Object storage errors
    #[error("Object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// The CSV source itself is unusable
    #[error("CSV source error: {0}")]
    Source(String),
}

impl SyncError {
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn source_error(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }
}
