//! Library tree scanning.
//!
//! A library root is laid out as `{category}/{asset}/{variant|data}/...`.
//! The scanner walks exactly that structure in lexicographic order and
//! groups files by asset unit and variant.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::manifest::paths::{validate_relative_path, DATA_FOLDER};

/// Errors that can occur while scanning a library tree.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("library root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file or folder name cannot be stored in an archive.
    #[error("unsupported file name at {0}")]
    InvalidName(PathBuf),
}

/// Identifies an asset unit within a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    pub category: String,
    pub asset: String,
}

impl AssetKey {
    pub fn new(category: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            asset: asset.into(),
        }
    }

    /// Library-relative folder of the asset (`category/asset`).
    pub fn relative_dir(&self) -> String {
        format!("{}/{}", self.category, self.asset)
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.asset)
    }
}

/// A file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Library-relative `/`-separated path.
    pub relative: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    pub size: u64,
}

/// One asset folder with its variants and shared data bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUnit {
    pub key: AssetKey,
    /// Variant folder name to the files beneath it.
    pub variants: BTreeMap<String, Vec<ScannedFile>>,
    /// Files of the shared `data` folder.
    pub data: Vec<ScannedFile>,
    /// Number of child folders (variants plus `data`).
    pub child_folders: usize,
}

impl AssetUnit {
    /// An asset needs its own variant folder next to `data`.
    pub fn is_well_formed(&self) -> bool {
        self.child_folders >= 2 && !self.variants.is_empty()
    }

    /// Files of one variant group: the variant's own files plus the data bundle.
    pub fn group_files(&self, variant: &str) -> Vec<&ScannedFile> {
        self.variants
            .get(variant)
            .into_iter()
            .flatten()
            .chain(self.data.iter())
            .collect()
    }

    /// Every distinct file of the unit.
    pub fn all_files(&self) -> impl Iterator<Item = &ScannedFile> {
        self.variants.values().flatten().chain(self.data.iter())
    }
}

/// Result of scanning a library root.
#[derive(Debug, Clone, Default)]
pub struct LibraryScan {
    root: PathBuf,
    units: Vec<AssetUnit>,
    ignored: Vec<String>,
}

impl LibraryScan {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Asset units in lexicographic order.
    pub fn units(&self) -> &[AssetUnit] {
        &self.units
    }

    /// Files outside the `category/asset/folder` structure.
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Asset key to variant to files, with the data bundle attached to every variant.
    pub fn groups(&self) -> BTreeMap<AssetKey, BTreeMap<String, Vec<ScannedFile>>> {
        self.units
            .iter()
            .map(|unit| {
                let variants = unit
                    .variants
                    .keys()
                    .map(|variant| {
                        let files = unit.group_files(variant).into_iter().cloned().collect();
                        (variant.clone(), files)
                    })
                    .collect();
                (unit.key.clone(), variants)
            })
            .collect()
    }

    /// Asset units lacking a separate variant folder.
    pub fn malformed(&self) -> Vec<&AssetKey> {
        self.units
            .iter()
            .filter(|unit| !unit.is_well_formed())
            .map(|unit| &unit.key)
            .collect()
    }

    /// Every distinct file of the scan.
    pub fn files(&self) -> impl Iterator<Item = &ScannedFile> {
        self.units.iter().flat_map(|unit| unit.all_files())
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn total_size(&self) -> u64 {
        self.files().map(|f| f.size).sum()
    }
}

/// Walks library roots.
#[derive(Debug, Clone, Default)]
pub struct LibraryScanner;

impl LibraryScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan a library root.
    ///
    /// Entries whose names start with `.` (including the `._data` control
    /// directory) and symbolic links are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory, a directory cannot be
    /// read, or a name is not representable as a library path.
    pub fn scan(&self, root: &Path) -> Result<LibraryScan, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut scan = LibraryScan {
            root: root.to_path_buf(),
            ..Default::default()
        };

        for category in sorted_entries(root)? {
            let category_name = entry_name(&category)?;
            if !category.is_dir() {
                scan.ignored.push(category_name);
                continue;
            }

            for asset in sorted_entries(&category)? {
                let asset_name = entry_name(&asset)?;
                if !asset.is_dir() {
                    scan.ignored.push(format!("{}/{}", category_name, asset_name));
                    continue;
                }
                let key = AssetKey::new(category_name.clone(), asset_name);
                let unit = self.scan_asset(&asset, key, &mut scan.ignored)?;
                scan.units.push(unit);
            }
        }

        if !scan.ignored.is_empty() {
            debug!(
                root = %root.display(),
                count = scan.ignored.len(),
                "Ignored files outside the asset structure"
            );
        }
        info!(
            root = %root.display(),
            assets = scan.units.len(),
            files = scan.file_count(),
            "Scanned library"
        );
        Ok(scan)
    }

    fn scan_asset(
        &self,
        dir: &Path,
        key: AssetKey,
        ignored: &mut Vec<String>,
    ) -> Result<AssetUnit, ScanError> {
        let mut unit = AssetUnit {
            key,
            variants: BTreeMap::new(),
            data: Vec::new(),
            child_folders: 0,
        };
        let base = unit.key.relative_dir();

        for child in sorted_entries(dir)? {
            let child_name = entry_name(&child)?;
            let relative = format!("{}/{}", base, child_name);
            if !child.is_dir() {
                trace!(path = %relative, "Ignoring loose file in asset folder");
                ignored.push(relative);
                continue;
            }

            unit.child_folders += 1;
            let mut files = Vec::new();
            collect_files(&child, &relative, &mut files)?;

            if child_name == DATA_FOLDER {
                unit.data = files;
            } else {
                unit.variants.insert(child_name, files);
            }
        }

        Ok(unit)
    }
}

/// Recursively collect files beneath `dir` in lexicographic order.
fn collect_files(dir: &Path, relative: &str, out: &mut Vec<ScannedFile>) -> Result<(), ScanError> {
    for entry in sorted_entries(dir)? {
        let name = entry_name(&entry)?;
        let child_relative = format!("{}/{}", relative, name);
        if entry.is_dir() {
            collect_files(&entry, &child_relative, out)?;
        } else {
            let size = fs::metadata(&entry)
                .map_err(|e| ScanError::Io {
                    path: entry.clone(),
                    source: e,
                })?
                .len();
            if validate_relative_path(&child_relative).is_err() {
                return Err(ScanError::InvalidName(entry));
            }
            out.push(ScannedFile {
                relative: child_relative,
                path: entry,
                size,
            });
        }
    }
    Ok(())
}

/// Visible, non-symlink entries of a directory sorted by name.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let read = fs::read_dir(dir).map_err(|e| ScanError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| ScanError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| ScanError::Io {
            path: entry.path(),
            source: e,
        })?;
        if file_type.is_symlink() {
            debug!(path = %entry.path().display(), "Skipping symbolic link");
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

fn entry_name(path: &Path) -> Result<String, ScanError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ScanError::InvalidName(path.to_path_buf()))
}
