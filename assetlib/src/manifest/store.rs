//! JSON file I/O shared by every control document.
//!
//! Writes go to a sibling temporary file that is renamed into place, so a
//! crash never leaves a truncated manifest behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use super::error::{ManifestError, ManifestResult};
use super::paths;
use super::volume::VolumeManifest;

/// Read and deserialize a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> ManifestResult<T> {
    let text = fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
        origin: path.display().to_string(),
        source,
    })
}

/// Serialize a value as pretty JSON and atomically replace `path`.
///
/// Parent directories are created as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ManifestResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ManifestError::Parse {
        origin: path.display().to_string(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ManifestError::io(parent, e))?;
    }

    let tmp = temp_sibling(path);
    fs::write(&tmp, text).map_err(|e| ManifestError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(ManifestError::io(path, e));
    }
    trace!(path = %path.display(), "Wrote JSON document");
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read and validate a volume manifest file.
pub fn read_manifest(path: &Path) -> ManifestResult<VolumeManifest> {
    let text = fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;
    VolumeManifest::from_json(&text, &path.display().to_string())
}

/// Validate and atomically write a volume manifest file.
pub fn write_manifest(path: &Path, manifest: &VolumeManifest) -> ManifestResult<()> {
    manifest.validate()?;
    write_json(path, manifest)
}

/// Installed-manifest files of a library root, sorted by path.
///
/// A root without a control directory has no installed volumes.
pub fn installed_manifest_files(root: &Path) -> Vec<PathBuf> {
    let dir = paths::volumes_installed_dir(root);
    if !dir.is_dir() {
        return Vec::new();
    }

    let pattern = format!(
        "{}/*.json",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut files: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(entries) => entries.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(e) => {
            debug!(pattern = %pattern, error = %e, "Invalid manifest glob pattern");
            Vec::new()
        }
    };
    files.sort();
    files
}
