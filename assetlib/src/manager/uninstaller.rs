//! Volume uninstaller.
//!
//! Removes the files of one installed volume from a library root. Files that
//! another installed volume of the same root still lists are kept, and
//! folders are only pruned when nothing else lives in them.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::manifest::{self, paths, VolumeManifest};

use super::error::{ManagerError, ManagerResult};
use super::registry::{installed_in_root, InstalledVolumeRegistry};

/// Result of uninstalling one volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub volume: String,
    pub files_removed: u64,
    /// Listed files that were already gone.
    pub files_missing: u64,
    /// Files kept because another installed volume lists them.
    pub files_kept: u64,
    pub folders_removed: u64,
}

/// Removes installed volumes.
#[derive(Debug, Clone)]
pub struct VolumeUninstaller {
    registry: Arc<InstalledVolumeRegistry>,
}

impl VolumeUninstaller {
    pub fn new(registry: Arc<InstalledVolumeRegistry>) -> Self {
        Self { registry }
    }

    /// Uninstall `volume` from the library at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::VolumeNotInstalled`] if the root has no
    /// installed manifest for the volume, or an I/O error if a file or the
    /// manifest cannot be removed.
    pub fn uninstall(&self, root: &Path, volume: &str) -> ManagerResult<UninstallReport> {
        let manifest_path = paths::installed_manifest_path(root, volume);
        if !manifest_path.is_file() {
            return Err(ManagerError::VolumeNotInstalled {
                root: root.to_path_buf(),
                volume: volume.to_string(),
            });
        }
        let target = manifest::read_manifest(&manifest_path)?;
        let protected = protected_paths(root, volume);

        let mut report = UninstallReport {
            volume: volume.to_string(),
            ..Default::default()
        };
        let mut touched: BTreeSet<PathBuf> = BTreeSet::new();

        for file in target.payload_files() {
            if protected.contains(&file.file_path) {
                report.files_kept += 1;
                continue;
            }
            let path = paths::resolve(root, &file.file_path);
            match fs::remove_file(&path) {
                Ok(()) => report.files_removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => report.files_missing += 1,
                Err(e) => return Err(ManagerError::RemoveFailed { path, source: e }),
            }
            if let Some(parent) = path.parent() {
                touched.insert(parent.to_path_buf());
            }
        }

        report.folders_removed = prune_folders(root, &target, &touched, &protected);

        fs::remove_file(&manifest_path).map_err(|e| ManagerError::RemoveFailed {
            path: manifest_path.clone(),
            source: e,
        })?;
        self.registry.invalidate();

        info!(
            volume = %volume,
            root = %root.display(),
            removed = report.files_removed,
            kept = report.files_kept,
            missing = report.files_missing,
            folders = report.folders_removed,
            "Uninstalled volume"
        );
        Ok(report)
    }
}

/// Paths listed by every other installed manifest of `root`.
fn protected_paths(root: &Path, volume: &str) -> HashSet<String> {
    installed_in_root(root)
        .into_iter()
        .filter(|installed| installed.name() != volume)
        .flat_map(|installed| {
            installed
                .manifest
                .payload_files()
                .map(|f| f.file_path.clone())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Remove folders emptied by the uninstall, deepest first.
///
/// The three levels above a file (`category/asset/variant`) are handled
/// differently: variant sub-folders go as soon as they are empty, the shared
/// `data` folder only when it is the last thing left in its asset folder and
/// nothing in it is protected, and asset and category folders only when empty.
fn prune_folders(
    root: &Path,
    target: &VolumeManifest,
    touched: &BTreeSet<PathBuf>,
    protected: &HashSet<String>,
) -> u64 {
    let mut removed = 0u64;

    // Deepest first so children empty out before their parents are checked.
    let mut dirs: Vec<&PathBuf> = touched.iter().collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    let mut assets: BTreeSet<PathBuf> = BTreeSet::new();
    for dir in dirs {
        let Ok(relative) = dir.strip_prefix(root) else {
            continue;
        };
        // `data` is handled per asset below.
        let in_data = relative
            .components()
            .nth(2)
            .is_some_and(|c| c.as_os_str() == paths::DATA_FOLDER);

        // Walk up to, but not including, the asset folder.
        let mut current = dir.clone();
        let mut depth = relative.components().count();
        while !in_data && depth > 2 {
            if !remove_if_empty(&current) {
                break;
            }
            removed += 1;
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
            depth -= 1;
        }
        if relative.components().count() >= 2 {
            assets.insert(root.join(relative.iter().take(2).collect::<PathBuf>()));
        }
    }

    for asset in &assets {
        removed += prune_data_folder(root, asset, protected);
        if remove_if_empty(asset) {
            removed += 1;
            if let Some(category) = asset.parent() {
                if category != root && remove_if_empty(category) {
                    removed += 1;
                }
            }
        }
    }

    debug!(volume = %target.volume_name, folders = removed, "Pruned folders");
    removed
}

/// Remove `asset/data` if it is the only entry of the asset folder and holds
/// no protected file.
fn prune_data_folder(root: &Path, asset: &Path, protected: &HashSet<String>) -> u64 {
    let data = asset.join(paths::DATA_FOLDER);
    if !data.is_dir() {
        return 0;
    }
    let entries: Vec<_> = match fs::read_dir(asset) {
        Ok(entries) => entries.filter_map(Result::ok).collect(),
        Err(_) => return 0,
    };
    if entries.len() != 1 {
        return 0;
    }

    let prefix = match data.strip_prefix(root) {
        Ok(rel) => format!("{}/", to_library_path(rel)),
        Err(_) => return 0,
    };
    if protected.iter().any(|p| p.starts_with(&prefix)) {
        debug!(path = %data.display(), "Keeping shared data folder");
        return 0;
    }

    match fs::remove_dir_all(&data) {
        Ok(()) => 1,
        Err(e) => {
            warn!(path = %data.display(), error = %e, "Failed to remove data folder");
            0
        }
    }
}

fn remove_if_empty(dir: &Path) -> bool {
    let empty = fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none());
    empty && fs::remove_dir(dir).is_ok()
}

fn to_library_path(relative: &Path) -> String {
    relative
        .iter()
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
