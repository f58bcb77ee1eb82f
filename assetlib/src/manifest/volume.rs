//! Volume manifest: the self-describing record embedded in every archive.
//!
//! The same document is copied into a library's `._volumes_installed`
//! folder at install time, where it becomes the installed-state ledger.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{ManifestError, ManifestResult};
use super::paths::{self, embedded_manifest_entry, validate_relative_path};

/// Ordinal reserved for the manifest's own entry in `files_dict`.
pub const SELF_ENTRY_ORDINAL: i64 = -1;

/// Kind of library a volume installs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LibraryType {
    /// The product's default library.
    #[serde(rename = "default_library")]
    Default,
    /// The user's own library.
    #[serde(rename = "user_library")]
    User,
    /// A named expansion library living beside the default library.
    #[serde(rename = "expansion_library")]
    Expansion,
}

impl LibraryType {
    /// Wire name used in manifests and `library_info.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default_library",
            Self::User => "user_library",
            Self::Expansion => "expansion_library",
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    /// Uncompressed size in bytes.
    pub file_size: u64,
    /// Final path segment.
    pub file_name: String,
    /// Full library-relative path (`/`-separated).
    pub file_path: String,
}

impl ManifestFile {
    /// Create an entry for a library-relative path.
    pub fn new(file_path: impl Into<String>, file_size: u64) -> Self {
        let file_path = file_path.into();
        Self {
            file_size,
            file_name: paths::file_name(&file_path).to_string(),
            file_path,
        }
    }
}

/// Identity fields shared by every volume built from one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeIdentity {
    pub product: String,
    pub library_name: String,
    pub library_type: LibraryType,
    pub library_version: String,
    pub volume_version: String,
}

/// Manifest describing one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeManifest {
    /// Tier label of the payload (e.g. `4k`, or `Main`).
    pub volume_info: String,
    pub product: String,
    pub library_name: String,
    pub library_type: LibraryType,
    pub library_version: String,
    /// Number of payload files (the self entry is not counted).
    pub total_files: u64,
    pub volume_version: String,
    pub volume_name: String,
    /// Sum of payload file sizes.
    pub uncompressed_size: u64,
    /// Volumes this one supersedes.
    pub replace_the_volumes: Vec<String>,
    pub files_dict: BTreeMap<i64, ManifestFile>,
}

impl VolumeManifest {
    /// Build a manifest for a payload, numbering files in the given order.
    pub fn new(
        identity: &VolumeIdentity,
        volume_name: impl Into<String>,
        tier: impl Into<String>,
        files: impl IntoIterator<Item = ManifestFile>,
        replace_the_volumes: Vec<String>,
    ) -> Self {
        let volume_name = volume_name.into();
        let mut files_dict = BTreeMap::new();
        let mut uncompressed_size = 0u64;
        let mut total_files = 0u64;

        for (ordinal, file) in files.into_iter().enumerate() {
            uncompressed_size += file.file_size;
            total_files += 1;
            files_dict.insert(ordinal as i64, file);
        }
        files_dict.insert(
            SELF_ENTRY_ORDINAL,
            ManifestFile::new(embedded_manifest_entry(&volume_name), 0),
        );

        Self {
            volume_info: tier.into(),
            product: identity.product.clone(),
            library_name: identity.library_name.clone(),
            library_type: identity.library_type,
            library_version: identity.library_version.clone(),
            total_files,
            volume_version: identity.volume_version.clone(),
            volume_name,
            uncompressed_size,
            replace_the_volumes,
            files_dict,
        }
    }

    /// Parse and validate a manifest from JSON text.
    ///
    /// `origin` names the source (file or archive) in error messages.
    pub fn from_json(json: &str, origin: &str) -> ManifestResult<Self> {
        let manifest: Self = serde_json::from_str(json).map_err(|source| ManifestError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> ManifestResult<String> {
        serde_json::to_string_pretty(self).map_err(|source| ManifestError::Parse {
            origin: self.volume_name.clone(),
            source,
        })
    }

    /// Check internal consistency.
    pub fn validate(&self) -> ManifestResult<()> {
        let name = self.volume_name.as_str();
        if name.is_empty() {
            return Err(ManifestError::invalid(name, "volume_name is empty"));
        }
        if name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(ManifestError::invalid(name, "volume_name is not a plain file name"));
        }
        if self.product.is_empty() {
            return Err(ManifestError::invalid(name, "product is empty"));
        }

        match self.files_dict.get(&SELF_ENTRY_ORDINAL) {
            Some(entry) if entry.file_path == embedded_manifest_entry(name) => {}
            Some(entry) => {
                return Err(ManifestError::invalid(
                    name,
                    format!("self entry points at '{}'", entry.file_path),
                ))
            }
            None => return Err(ManifestError::invalid(name, "missing self entry \"-1\"")),
        }

        let mut count = 0u64;
        let mut total = 0u64;
        for (ordinal, file) in &self.files_dict {
            if *ordinal < SELF_ENTRY_ORDINAL {
                return Err(ManifestError::invalid(
                    name,
                    format!("negative ordinal {}", ordinal),
                ));
            }
            if *ordinal == SELF_ENTRY_ORDINAL {
                continue;
            }
            validate_relative_path(&file.file_path)?;
            if paths::file_name(&file.file_path) != file.file_name {
                return Err(ManifestError::invalid(
                    name,
                    format!(
                        "file_name '{}' does not match path '{}'",
                        file.file_name, file.file_path
                    ),
                ));
            }
            count += 1;
            total += file.file_size;
        }

        if count != self.total_files {
            return Err(ManifestError::invalid(
                name,
                format!("total_files is {} but {} files are listed", self.total_files, count),
            ));
        }
        if total != self.uncompressed_size {
            return Err(ManifestError::invalid(
                name,
                format!(
                    "uncompressed_size is {} but listed files sum to {}",
                    self.uncompressed_size, total
                ),
            ));
        }
        Ok(())
    }

    /// Payload entries in ordinal order, excluding the self entry.
    pub fn payload_files(&self) -> impl Iterator<Item = &ManifestFile> {
        self.files_dict
            .iter()
            .filter(|(ordinal, _)| **ordinal != SELF_ENTRY_ORDINAL)
            .map(|(_, file)| file)
    }

    /// Archive entry name of this manifest.
    pub fn embedded_entry(&self) -> String {
        embedded_manifest_entry(&self.volume_name)
    }
}
