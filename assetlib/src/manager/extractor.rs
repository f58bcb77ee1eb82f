//! ZIP volume reading and selective extraction.
//!
//! This module handles:
//! - Reading the manifest embedded in a volume archive
//! - Streaming only the planned entries to their destinations
//!
//! Entries are written to a `.part` sibling and renamed into place, so an
//! interrupted extraction never leaves a truncated file under its final name.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use zip::ZipArchive;

use crate::manifest::{paths, VolumeManifest};

use super::error::{ManagerError, ManagerResult};
use super::job::PlannedFile;
use super::traits::ArchiveExtractor;

/// Embedded manifests larger than this are rejected.
const MAX_MANIFEST_BYTES: u64 = 64 * 1024 * 1024;

/// [`ArchiveExtractor`] for ZIP volumes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    /// Create a new ZIP extractor.
    pub fn new() -> Self {
        Self
    }

    fn open(&self, archive: &Path) -> Result<ZipArchive<File>, String> {
        let file = File::open(archive).map_err(|e| e.to_string())?;
        ZipArchive::new(file).map_err(|e| format!("not a readable ZIP archive: {}", e))
    }

    fn read_embedded(&self, archive: &Path) -> Result<VolumeManifest, String> {
        let mut zip = self.open(archive)?;

        let entries: Vec<String> = zip
            .file_names()
            .filter(|name| paths::is_manifest_entry(name))
            .map(str::to_string)
            .collect();
        let entry = match entries.as_slice() {
            [] => return Err("no embedded manifest".to_string()),
            [entry] => entry.clone(),
            _ => return Err(format!("{} embedded manifests", entries.len())),
        };

        let mut text = String::new();
        zip.by_name(&entry)
            .map_err(|e| e.to_string())?
            .take(MAX_MANIFEST_BYTES)
            .read_to_string(&mut text)
            .map_err(|e| format!("unreadable manifest entry: {}", e))?;

        let manifest = VolumeManifest::from_json(&text, &entry).map_err(|e| e.to_string())?;
        if manifest.embedded_entry() != entry {
            return Err(format!(
                "manifest entry {} does not match volume {}",
                entry, manifest.volume_name
            ));
        }
        Ok(manifest)
    }

    fn extract_one(&self, zip: &mut ZipArchive<File>, file: &PlannedFile) -> ManagerResult<u64> {
        let failed = |reason: String| ManagerError::ExtractionFailed {
            path: file.destination.clone(),
            reason,
        };

        let mut entry = zip
            .by_name(&file.relative)
            .map_err(|e| failed(format!("entry {}: {}", file.relative, e)))?;

        if let Some(parent) = file.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let part = part_path(&file.destination);
        let written = write_entry(&mut entry, &part).map_err(|e| {
            let _ = fs::remove_file(&part);
            failed(e.to_string())
        })?;

        if written != file.size {
            let _ = fs::remove_file(&part);
            return Err(failed(format!(
                "expected {} bytes, archive holds {}",
                file.size, written
            )));
        }

        if file.destination.exists() {
            fs::remove_file(&file.destination).map_err(|e| ManagerError::RemoveFailed {
                path: file.destination.clone(),
                source: e,
            })?;
        }
        fs::rename(&part, &file.destination).map_err(|e| ManagerError::WriteFailed {
            path: file.destination.clone(),
            source: e,
        })?;

        trace!(path = %file.destination.display(), bytes = written, "Extracted file");
        Ok(written)
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn read_manifest(&self, archive: &Path) -> ManagerResult<VolumeManifest> {
        self.read_embedded(archive)
            .map_err(|reason| ManagerError::InvalidArchive {
                path: archive.to_path_buf(),
                reason,
            })
    }

    fn extract_files(
        &self,
        archive: &Path,
        files: &[PlannedFile],
        on_file: &mut dyn FnMut(&PlannedFile, ManagerResult<u64>) -> ControlFlow<()>,
    ) -> ManagerResult<()> {
        let mut zip = self
            .open(archive)
            .map_err(|reason| ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason,
            })?;

        for file in files {
            let result = self.extract_one(&mut zip, file);
            if on_file(file, result).is_break() {
                debug!(archive = %archive.display(), "Extraction stopped early");
                break;
            }
        }
        Ok(())
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

fn write_entry(entry: &mut impl Read, path: &Path) -> io::Result<u64> {
    let mut out = BufWriter::new(File::create(path)?);
    let written = io::copy(entry, &mut out)?;
    out.flush()?;
    Ok(written)
}
