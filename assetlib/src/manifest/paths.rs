//! Control-directory layout and library-relative path helpers.
//!
//! Library-relative paths are always `/`-separated strings, both inside
//! archives and in manifests, and are joined onto a root one segment at a time.

use std::path::{Path, PathBuf};

use super::error::{ManifestError, ManifestResult};

/// Reserved control directory at the top of every library root.
pub const CONTROL_DIR: &str = "._data";

/// Directory (inside [`CONTROL_DIR`]) holding one manifest per installed volume.
pub const VOLUMES_INSTALLED_DIR: &str = "._volumes_installed";

/// Library identity file inside [`CONTROL_DIR`].
pub const LIBRARY_INFO_FILE: &str = "library_info.json";

/// Compressed-size cache inside [`CONTROL_DIR`].
pub const SIZE_REGISTER_FILE: &str = "zips_size_register.json";

/// Name of the shared data bundle folder of an asset unit.
pub const DATA_FOLDER: &str = "data";

/// Archive entry name of a volume's embedded manifest.
pub fn embedded_manifest_entry(volume_name: &str) -> String {
    format!(
        "{}/{}/{}.json",
        CONTROL_DIR, VOLUMES_INSTALLED_DIR, volume_name
    )
}

/// Returns true if an archive entry name is an embedded manifest.
pub fn is_manifest_entry(entry: &str) -> bool {
    let prefix = format!("{}/{}/", CONTROL_DIR, VOLUMES_INSTALLED_DIR);
    entry
        .strip_prefix(&prefix)
        .is_some_and(|name| name.ends_with(".json") && !name.contains('/'))
}

/// Directory holding the installed-volume manifests of a library root.
pub fn volumes_installed_dir(root: &Path) -> PathBuf {
    root.join(CONTROL_DIR).join(VOLUMES_INSTALLED_DIR)
}

/// Path of a volume's installed manifest in a library root.
pub fn installed_manifest_path(root: &Path, volume_name: &str) -> PathBuf {
    volumes_installed_dir(root).join(format!("{}.json", volume_name))
}

/// Path of a library root's `library_info.json`.
pub fn library_info_path(root: &Path) -> PathBuf {
    root.join(CONTROL_DIR).join(LIBRARY_INFO_FILE)
}

/// Path of a library root's compressed-size register.
pub fn size_register_path(root: &Path) -> PathBuf {
    root.join(CONTROL_DIR).join(SIZE_REGISTER_FILE)
}

/// Check that a library-relative path stays inside its root.
///
/// Rejects empty paths, absolute paths, backslashes, and `.`/`..`/empty segments.
pub fn validate_relative_path(path: &str) -> ManifestResult<()> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(ManifestError::UnsafePath(path.to_string()));
    }
    let bad_segment = path
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == ".." || seg.contains(':'));
    if bad_segment {
        return Err(ManifestError::UnsafePath(path.to_string()));
    }
    Ok(())
}

/// Join a validated library-relative path onto a root.
pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}

/// Final segment of a library-relative path.
pub fn file_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}
