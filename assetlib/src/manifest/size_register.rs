//! Persistent cache of per-file compressed-size estimates.
//!
//! Stored at `._data/zips_size_register.json` as `{relative_path: bytes}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::ManifestResult;
use super::paths;
use super::store;

/// Compressed-size register of one library root.
#[derive(Debug, Clone, Default)]
pub struct SizeRegister {
    path: PathBuf,
    entries: BTreeMap<String, u64>,
}

impl SizeRegister {
    /// Load the register of a root.
    ///
    /// A missing or unreadable register starts empty; it is only a cache.
    pub fn load(root: &Path) -> Self {
        let path = paths::size_register_path(root);
        let entries = if path.is_file() {
            match store::read_json(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable size register");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "Loaded size register");
        Self { path, entries }
    }

    pub fn get(&self, relative: &str) -> Option<u64> {
        self.entries.get(relative).copied()
    }

    pub fn insert(&mut self, relative: impl Into<String>, compressed: u64) {
        self.entries.insert(relative.into(), compressed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.entries
    }

    pub fn save(&self) -> ManifestResult<()> {
        store::write_json(&self.path, &self.entries)
    }
}
