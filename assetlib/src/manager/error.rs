//! Error types for the volume manager.

use std::io;
use std::path::PathBuf;

use crate::config::display_size;
use crate::library::LibraryError;
use crate::manifest::ManifestError;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while installing, uninstalling or inspecting volumes.
#[derive(Debug)]
pub enum ManagerError {
    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to delete a file or directory.
    RemoveFailed { path: PathBuf, source: io::Error },

    /// The archive cannot be opened or lacks a usable embedded manifest.
    InvalidArchive { path: PathBuf, reason: String },

    /// Archive extraction failed.
    ExtractionFailed { path: PathBuf, reason: String },

    /// Invalid configuration.
    InvalidConfig(String),

    /// Library paths are in a state that makes the operation unsafe.
    InvalidState(String),

    /// Planned files do not fit on the destination filesystem.
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// None of the given archives could be used.
    NoValidArchives { rejected: usize },

    /// Another install is already running on this installer.
    InstallInProgress,

    /// The volume has no installed manifest in the given root.
    VolumeNotInstalled { root: PathBuf, volume: String },

    /// No free folder name was found for a new expansion library.
    RootAllocationFailed(String),

    /// Failed to fetch a catalog.
    CatalogFetchFailed { source: String, reason: String },

    /// Failed to parse a catalog.
    CatalogParseFailed { source: String, reason: String },

    /// A manifest could not be read or written.
    Manifest(ManifestError),

    /// A library root could not be opened or created.
    Library(LibraryError),
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::RemoveFailed { path, source } => {
                write!(f, "failed to remove {}: {}", path.display(), source)
            }
            Self::InvalidArchive { path, reason } => {
                write!(f, "invalid archive {}: {}", path.display(), reason)
            }
            Self::ExtractionFailed { path, reason } => {
                write!(f, "failed to extract {}: {}", path.display(), reason)
            }
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::InvalidState(msg) => write!(f, "invalid library state: {}", msg),
            Self::InsufficientSpace {
                path,
                required,
                available,
            } => {
                write!(
                    f,
                    "not enough free space on {}: {} required, {} available ({} short)",
                    path.display(),
                    display_size(*required),
                    display_size(*available),
                    display_size(required.saturating_sub(*available))
                )
            }
            Self::NoValidArchives { rejected } => {
                write!(f, "no valid archives to install ({} rejected)", rejected)
            }
            Self::InstallInProgress => write!(f, "another installation is already running"),
            Self::VolumeNotInstalled { root, volume } => {
                write!(
                    f,
                    "volume {} is not installed in {}",
                    volume,
                    root.display()
                )
            }
            Self::RootAllocationFailed(name) => {
                write!(f, "no free folder name for expansion library '{}'", name)
            }
            Self::CatalogFetchFailed { source, reason } => {
                write!(f, "failed to fetch catalog from {}: {}", source, reason)
            }
            Self::CatalogParseFailed { source, reason } => {
                write!(f, "failed to parse catalog from {}: {}", source, reason)
            }
            Self::Manifest(err) => write!(f, "{}", err),
            Self::Library(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::RemoveFailed { source, .. } => Some(source),
            Self::Manifest(err) => Some(err),
            Self::Library(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ManifestError> for ManagerError {
    fn from(err: ManifestError) -> Self {
        Self::Manifest(err)
    }
}

impl From<LibraryError> for ManagerError {
    fn from(err: LibraryError) -> Self {
        Self::Library(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_insufficient_space_display() {
        let err = ManagerError::InsufficientSpace {
            path: PathBuf::from("/library"),
            required: 2 * 1024 * 1024 * 1024,
            available: 1024 * 1024 * 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("/library"));
        assert!(msg.contains("2.00 GB required"));
        assert!(msg.contains("1.00 GB available"));
        assert!(msg.contains("(1.00 GB short)"));
    }

    #[test]
    fn test_volume_not_installed_display() {
        let err = ManagerError::VolumeNotInstalled {
            root: PathBuf::from("/lib"),
            volume: "Studio_4k_Vol_001".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "volume Studio_4k_Vol_001 is not installed in /lib"
        );
    }

    #[test]
    fn test_error_source() {
        let err = ManagerError::RemoveFailed {
            path: PathBuf::from("/x"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(ManagerError::InstallInProgress.source().is_none());
    }
}
