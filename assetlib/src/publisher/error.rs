//! Error types for the publisher module.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::library::ScanError;
use crate::manifest::ManifestError;

/// Result type for publisher operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that can occur while packing volumes.
#[derive(Debug)]
pub enum PublishError {
    /// Invalid path provided.
    InvalidPath(String),

    /// Pack options are unusable.
    InvalidOptions(String),

    /// Failed to create directory.
    CreateDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read file.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write file.
    WriteFailed { path: PathBuf, source: io::Error },

    /// The source library could not be scanned.
    Scan(ScanError),

    /// Asset units without a separate variant folder.
    MalformedAssets(Vec<String>),

    /// An archive already in the output directory cannot be read.
    InvalidArchive { path: PathBuf, reason: String },

    /// Archive building failed.
    ArchiveFailed(String),

    /// No free volume name was found within the probe bound.
    NameExhausted { product: String, tier: String },

    /// A manifest could not be built or written.
    Manifest(ManifestError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::InvalidPath(msg) => {
                write!(f, "invalid path: {}", msg)
            }
            PublishError::InvalidOptions(msg) => {
                write!(f, "invalid pack options: {}", msg)
            }
            PublishError::CreateDirectoryFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            PublishError::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            PublishError::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            PublishError::Scan(err) => {
                write!(f, "failed to scan library: {}", err)
            }
            PublishError::MalformedAssets(assets) => {
                write!(
                    f,
                    "{} asset(s) have no separate variant folder: {}",
                    assets.len(),
                    assets.join(", ")
                )
            }
            PublishError::InvalidArchive { path, reason } => {
                write!(f, "unreadable archive {}: {}", path.display(), reason)
            }
            PublishError::ArchiveFailed(msg) => {
                write!(f, "archive failed: {}", msg)
            }
            PublishError::NameExhausted { product, tier } => {
                write!(
                    f,
                    "no free volume name for product '{}' tier '{}'",
                    product, tier
                )
            }
            PublishError::Manifest(err) => {
                write!(f, "manifest error: {}", err)
            }
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::CreateDirectoryFailed { source, .. } => Some(source),
            PublishError::ReadFailed { source, .. } => Some(source),
            PublishError::WriteFailed { source, .. } => Some(source),
            PublishError::Scan(err) => Some(err),
            PublishError::Manifest(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScanError> for PublishError {
    fn from(err: ScanError) -> Self {
        PublishError::Scan(err)
    }
}

impl From<ManifestError> for PublishError {
    fn from(err: ManifestError) -> Self {
        PublishError::Manifest(err)
    }
}
