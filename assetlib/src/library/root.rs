//! Library roots: folders carrying a `._data/library_info.json` identity.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::manifest::{LibraryInfo, ManifestError};

/// Errors that can occur while opening or creating a library root.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{0} is not a library (no library_info.json)")]
    NotALibrary(PathBuf),

    #[error("{0} is already a library")]
    AlreadyLibrary(PathBuf),

    #[error("{0} exists and is not empty")]
    NotEmpty(PathBuf),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// A library root and its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRoot {
    path: PathBuf,
    info: LibraryInfo,
}

impl LibraryRoot {
    /// Open an existing library root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref().to_path_buf();
        match LibraryInfo::read(&path)? {
            Some(info) => Ok(Self { path, info }),
            None => Err(LibraryError::NotALibrary(path)),
        }
    }

    /// Create a new library in a missing or empty folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder exists and has any entries, or if the
    /// folder or identity file cannot be written.
    pub fn create(path: impl AsRef<Path>, info: LibraryInfo) -> Result<Self, LibraryError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            if !path.is_dir() {
                return Err(LibraryError::NotADirectory(path));
            }
            let mut entries = fs::read_dir(&path).map_err(|e| LibraryError::Io {
                path: path.clone(),
                source: e,
            })?;
            if entries.next().is_some() {
                return Err(LibraryError::NotEmpty(path));
            }
        }
        fs::create_dir_all(&path).map_err(|e| LibraryError::Io {
            path: path.clone(),
            source: e,
        })?;

        info.write(&path)?;
        info!(
            path = %path.display(),
            library = %info.library_name,
            library_type = %info.library_type,
            "Created library"
        );
        Ok(Self { path, info })
    }

    /// Turn an existing plain folder of assets into a library.
    pub fn convert(path: impl AsRef<Path>, info: LibraryInfo) -> Result<Self, LibraryError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(LibraryError::NotADirectory(path));
        }
        if LibraryInfo::read(&path)?.is_some() {
            return Err(LibraryError::AlreadyLibrary(path));
        }

        info.write(&path)?;
        info!(
            path = %path.display(),
            library = %info.library_name,
            "Converted folder to library"
        );
        Ok(Self { path, info })
    }

    /// Open a root, writing `info` first if the folder has no identity yet.
    pub fn open_or_init(path: impl AsRef<Path>, info: LibraryInfo) -> Result<Self, LibraryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(existing) = LibraryInfo::read(&path)? {
            return Ok(Self {
                path,
                info: existing,
            });
        }
        fs::create_dir_all(&path).map_err(|e| LibraryError::Io {
            path: path.clone(),
            source: e,
        })?;
        info.write(&path)?;
        Ok(Self { path, info })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &LibraryInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::LibraryType;
    use tempfile::TempDir;

    fn info() -> LibraryInfo {
        LibraryInfo::new("Studio", LibraryType::User, "My Assets", "1")
    }

    #[test]
    fn test_create_then_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lib");

        let created = LibraryRoot::create(&path, info()).unwrap();
        let opened = LibraryRoot::open(&path).unwrap();
        assert_eq!(created, opened);
        assert_eq!(opened.info().library_name, "My Assets");
    }

    #[test]
    fn test_create_rejects_non_empty() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), "x").unwrap();
        assert!(matches!(
            LibraryRoot::create(temp.path(), info()),
            Err(LibraryError::NotEmpty(_))
        ));
    }

    #[test]
    fn test_convert_existing_folder() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("rocks/granite/4k")).unwrap();

        LibraryRoot::convert(temp.path(), info()).unwrap();
        assert!(matches!(
            LibraryRoot::convert(temp.path(), info()),
            Err(LibraryError::AlreadyLibrary(_))
        ));
    }

    #[test]
    fn test_open_plain_folder_fails() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            LibraryRoot::open(temp.path()),
            Err(LibraryError::NotALibrary(_))
        ));
    }

    #[test]
    fn test_open_or_init_keeps_existing_identity() {
        let temp = TempDir::new().unwrap();
        LibraryRoot::open_or_init(temp.path(), info()).unwrap();

        let other = LibraryInfo::new("Studio", LibraryType::User, "Renamed", "2");
        let root = LibraryRoot::open_or_init(temp.path(), other).unwrap();
        assert_eq!(root.info().library_name, "My Assets");
    }
}
