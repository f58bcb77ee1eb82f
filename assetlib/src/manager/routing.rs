//! Destination routing for volumes.
//!
//! Default and user volumes go to their configured roots. Expansion volumes
//! are matched by `library_name` against the known expansion roots; an
//! unknown expansion gets a new folder beside the default library.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::manifest::{LibraryInfo, LibraryType, VolumeManifest};

use super::config::LibraryLayout;
use super::error::{ManagerError, ManagerResult};

/// Upper bound on numbered folder names tried for a new expansion root.
pub const MAX_ROOT_PROBES: u32 = 100;

/// Resolves destination roots during one preparation pass.
///
/// Roots allocated earlier in the pass are reused for later volumes of the
/// same expansion library even though nothing is on disk yet.
#[derive(Debug)]
pub struct DestinationRouter {
    layout: LibraryLayout,
    allocated: BTreeMap<String, PathBuf>,
}

impl DestinationRouter {
    pub fn new(layout: LibraryLayout) -> Self {
        Self {
            layout,
            allocated: BTreeMap::new(),
        }
    }

    /// Library root a volume installs into.
    ///
    /// # Errors
    ///
    /// Returns an error for user volumes when no user library is configured,
    /// or when no free folder name exists for a new expansion library.
    pub fn route(&mut self, manifest: &VolumeManifest) -> ManagerResult<PathBuf> {
        match manifest.library_type {
            LibraryType::Default => Ok(self.layout.default_root.clone()),
            LibraryType::User => self.layout.user_root.clone().ok_or_else(|| {
                ManagerError::InvalidConfig("no user library is configured".to_string())
            }),
            LibraryType::Expansion => self.route_expansion(&manifest.library_name),
        }
    }

    fn route_expansion(&mut self, library_name: &str) -> ManagerResult<PathBuf> {
        if let Some(root) = self.allocated.get(library_name) {
            return Ok(root.clone());
        }
        if let Some(root) = self
            .layout
            .expansion_roots
            .iter()
            .find(|root| is_expansion_named(root, library_name))
        {
            return Ok(root.clone());
        }

        let parent = self
            .layout
            .default_root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                ManagerError::InvalidConfig(format!(
                    "default library {} has no parent folder for expansions",
                    self.layout.default_root.display()
                ))
            })?;

        let base = folder_name(library_name);
        for attempt in 0..MAX_ROOT_PROBES {
            let candidate = if attempt == 0 {
                parent.join(&base)
            } else {
                parent.join(format!("{}_{}", base, attempt))
            };

            if self.layout.kind_of(&candidate).is_some() {
                debug!(path = %candidate.display(), "Folder is already a configured library");
                continue;
            }
            if is_expansion_named(&candidate, library_name) || is_free(&candidate) {
                info!(
                    library = %library_name,
                    path = %candidate.display(),
                    "Allocated expansion library root"
                );
                self.layout.add_expansion_root(candidate.clone());
                self.allocated
                    .insert(library_name.to_string(), candidate.clone());
                return Ok(candidate);
            }
            debug!(path = %candidate.display(), "Folder belongs to another library, probing next name");
        }

        Err(ManagerError::RootAllocationFailed(library_name.to_string()))
    }

    /// Roots allocated during this pass.
    pub fn allocated(&self) -> Vec<PathBuf> {
        self.allocated.values().cloned().collect()
    }
}

/// True if `root` carries the identity of the named expansion library.
fn is_expansion_named(root: &Path, library_name: &str) -> bool {
    matches!(
        LibraryInfo::read(root),
        Ok(Some(info)) if info.library_type == LibraryType::Expansion && info.library_name == library_name
    )
}

/// True if nothing lives at `path` yet, or it is an empty folder.
fn is_free(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    path.is_dir()
        && fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
}

/// Folder name for a library name.
fn folder_name(library_name: &str) -> String {
    let cleaned: String = library_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "Expansion".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestFile, VolumeIdentity};
    use tempfile::TempDir;

    fn manifest(library_type: LibraryType, library_name: &str) -> VolumeManifest {
        let identity = VolumeIdentity {
            product: "Studio".to_string(),
            library_name: library_name.to_string(),
            library_type,
            library_version: "1".to_string(),
            volume_version: "1".to_string(),
        };
        VolumeManifest::new(
            &identity,
            "Studio_4k_Vol_001",
            "4k",
            vec![ManifestFile::new("a/b/4k/x", 1)],
            Vec::new(),
        )
    }

    #[test]
    fn test_default_and_user_routing() {
        let layout = LibraryLayout::new("/libs/default").with_user_root("/libs/user");
        let mut router = DestinationRouter::new(layout);
        assert_eq!(
            router.route(&manifest(LibraryType::Default, "x")).unwrap(),
            PathBuf::from("/libs/default")
        );
        assert_eq!(
            router.route(&manifest(LibraryType::User, "x")).unwrap(),
            PathBuf::from("/libs/user")
        );

        let mut no_user = DestinationRouter::new(LibraryLayout::new("/libs/default"));
        assert!(no_user.route(&manifest(LibraryType::User, "x")).is_err());
    }

    #[test]
    fn test_expansion_matches_existing_root() {
        let temp = TempDir::new().unwrap();
        let forest = temp.path().join("somewhere_else");
        LibraryInfo::new("Studio", LibraryType::Expansion, "Forest", "1")
            .write(&forest)
            .unwrap();
        let layout = LibraryLayout::new(temp.path().join("default")).with_expansion_root(&forest);

        let mut router = DestinationRouter::new(layout);
        assert_eq!(
            router.route(&manifest(LibraryType::Expansion, "Forest")).unwrap(),
            forest
        );
        assert!(router.allocated().is_empty());
    }

    #[test]
    fn test_expansion_allocates_sibling_with_suffix() {
        let temp = TempDir::new().unwrap();
        let taken = temp.path().join("Forest");
        LibraryInfo::new("Studio", LibraryType::Expansion, "Other", "1")
            .write(&taken)
            .unwrap();
        let layout = LibraryLayout::new(temp.path().join("default"));

        let mut router = DestinationRouter::new(layout);
        let root = router
            .route(&manifest(LibraryType::Expansion, "Forest"))
            .unwrap();
        assert_eq!(root, temp.path().join("Forest_1"));

        // Second volume of the same library reuses the allocation.
        let again = router
            .route(&manifest(LibraryType::Expansion, "Forest"))
            .unwrap();
        assert_eq!(again, root);
        assert_eq!(router.allocated(), vec![root]);
    }

    #[test]
    fn test_folder_name_sanitised() {
        assert_eq!(folder_name("Rocks: Vol/2"), "Rocks_ Vol_2");
        assert_eq!(folder_name("..."), "Expansion");
    }
}
