//! Error types for manifest reading and writing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while reading, validating or writing manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read or write a manifest file.
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// The document is not valid JSON or does not match the manifest schema.
    #[error("malformed manifest {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },

    /// The manifest parsed but its contents are inconsistent.
    #[error("invalid manifest for volume '{volume}': {reason}")]
    Invalid { volume: String, reason: String },

    /// A file path is absolute, empty or escapes the library root.
    #[error("unsafe library path '{0}'")]
    UnsafePath(String),
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(volume: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            volume: volume.to_string(),
            reason: reason.into(),
        }
    }
}
