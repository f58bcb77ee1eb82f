//! `library_info.json`: the identity record of a library root.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ManifestResult;
use super::paths;
use super::store;
use super::volume::{LibraryType, VolumeManifest};

/// Identity of a library root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryInfo {
    pub library_version: String,
    pub library_product: String,
    pub library_type: LibraryType,
    pub library_name: String,
}

impl LibraryInfo {
    pub fn new(
        product: impl Into<String>,
        library_type: LibraryType,
        library_name: impl Into<String>,
        library_version: impl Into<String>,
    ) -> Self {
        Self {
            library_version: library_version.into(),
            library_product: product.into(),
            library_type,
            library_name: library_name.into(),
        }
    }

    /// Identity a volume's destination root should carry.
    pub fn for_volume(manifest: &VolumeManifest) -> Self {
        Self {
            library_version: manifest.library_version.clone(),
            library_product: manifest.product.clone(),
            library_type: manifest.library_type,
            library_name: manifest.library_name.clone(),
        }
    }

    /// Read the info file of a root, if present.
    pub fn read(root: &Path) -> ManifestResult<Option<Self>> {
        let path = paths::library_info_path(root);
        if !path.is_file() {
            return Ok(None);
        }
        store::read_json(&path).map(Some)
    }

    /// Write the info file of a root.
    pub fn write(&self, root: &Path) -> ManifestResult<()> {
        store::write_json(&paths::library_info_path(root), self)
    }
}
