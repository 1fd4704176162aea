//! Error types for Downloadinator core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Downloadinator core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Playlist metadata extraction failed. Callers get an empty track
    /// list and the session stays usable for a retry.
    #[error("Metadata extraction failed: {0}")]
    Extraction(String),

    /// A title pattern failed to compile.
    #[error("Invalid title pattern: {0}")]
    InvalidPattern(String),

    /// Audio fetch failed for a single track.
    #[error("Fetch failed for '{title}': {reason}")]
    Fetch {
        /// Title of the track that failed.
        title: String,
        /// Failure reason.
        reason: String,
    },

    /// Tag writing failed for a downloaded file.
    #[error("Tag write failed for {path}: {reason}")]
    TagWrite {
        /// Path to the file that could not be tagged.
        path: PathBuf,
        /// Failure reason.
        reason: String,
    },

    /// The destination directory could not be created. Fatal for the
    /// session: no downloads are dispatched after this.
    #[error("Failed to create directory {path}: {reason}")]
    DirectoryCreation {
        /// Directory that could not be created.
        path: PathBuf,
        /// Failure reason.
        reason: String,
    },

    /// Session document save/load failed.
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
