//! Catalog generation from packed volumes.

use std::path::{Path, PathBuf};

use tracing::info;

use super::PublishResult;
use crate::manager::Catalog;
use crate::manifest;

/// File name of the generated catalog.
pub const CATALOG_FILE: &str = "volumes_catalog.json";

/// Aggregate every standalone `{volume}.json` in `dist_dir` into
/// `volumes_catalog.json`.
///
/// Returns the catalog path and the catalog written.
pub fn build_catalog(dist_dir: &Path) -> PublishResult<(PathBuf, Catalog)> {
    let mut catalog = Catalog::default();
    let pattern = format!("{}/*.json", glob::Pattern::escape(&dist_dir.to_string_lossy()));
    let entries = glob::glob(&pattern)
        .map_err(|e| super::PublishError::InvalidPath(e.to_string()))?;

    for path in entries.filter_map(Result::ok) {
        if path.file_name().and_then(|n| n.to_str()) == Some(CATALOG_FILE) {
            continue;
        }
        let manifest = manifest::read_manifest(&path)?;
        catalog.insert(manifest);
    }

    let path = dist_dir.join(CATALOG_FILE);
    manifest::write_json(&path, &catalog)?;
    info!(
        path = %path.display(),
        volumes = catalog.len(),
        "Wrote volume catalog"
    );
    Ok((path, catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LibraryScanner;
    use crate::manifest::{LibraryType, VolumeIdentity};
    use crate::publisher::{PackOptions, VolumePacker};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_catalog_from_packed_volumes() {
        let lib = TempDir::new().unwrap();
        let dist = TempDir::new().unwrap();
        for (rel, len) in [
            ("rocks/granite/data/tags.json", 2),
            ("rocks/granite/4k/a.bin", 50),
            ("rocks/granite/2k/a.bin", 20),
        ] {
            let path = lib.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, vec![0u8; len]).unwrap();
        }
        let identity = VolumeIdentity {
            product: "Studio".to_string(),
            library_name: "Default".to_string(),
            library_type: LibraryType::Default,
            library_version: "1".to_string(),
            volume_version: "1".to_string(),
        };
        let scan = LibraryScanner::new().scan(lib.path()).unwrap();
        VolumePacker::new()
            .pack(&scan, &PackOptions::new(dist.path(), identity))
            .unwrap();

        let (path, catalog) = build_catalog(dist.path()).unwrap();
        assert!(path.exists());
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("Studio_4k_Vol_001").is_some());

        // Rebuilding ignores the previous catalog file.
        let (_, again) = build_catalog(dist.path()).unwrap();
        assert_eq!(again.len(), 2);
    }
}
