//! Trait definitions for volume manager abstractions.
//!
//! These traits enable dependency injection and testing of the manager components.

use std::io;
use std::ops::ControlFlow;
use std::path::Path;

use crate::manifest::VolumeManifest;

use super::catalog::Catalog;
use super::job::PlannedFile;
use super::ManagerResult;

/// Reads volume archives.
pub trait ArchiveExtractor: Send + Sync {
    /// Read and validate the manifest embedded in an archive.
    fn read_manifest(&self, archive: &Path) -> ManagerResult<VolumeManifest>;

    /// Extract the given entries, one at a time, to their destinations.
    ///
    /// `on_file` is called after each entry with the bytes written or the
    /// error for that entry; returning [`ControlFlow::Break`] stops extraction
    /// before the next entry.
    ///
    /// # Errors
    ///
    /// Only archive-level failures (the archive cannot be opened) are returned;
    /// per-entry failures go to `on_file`.
    fn extract_files(
        &self,
        archive: &Path,
        files: &[PlannedFile],
        on_file: &mut dyn FnMut(&PlannedFile, ManagerResult<u64>) -> ControlFlow<()>,
    ) -> ManagerResult<()>;
}

/// Reports free space of filesystems.
pub trait SpaceProbe: Send + Sync {
    /// Bytes available to unprivileged users on the filesystem holding `path`.
    fn available_space(&self, path: &Path) -> io::Result<u64>;

    /// Identifier of the filesystem holding `path`.
    fn device_id(&self, path: &Path) -> io::Result<u64>;
}

/// Source of the online volume catalog.
pub trait CatalogSource: Send + Sync {
    /// Fetch the current catalog.
    fn fetch(&self) -> ManagerResult<Catalog>;

    /// Human-readable location of the catalog.
    fn location(&self) -> String;
}
