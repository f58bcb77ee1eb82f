//! Installed-volume registry.
//!
//! Aggregates the installed manifests of every library root into one view.
//! The view is cached until [`InstalledVolumeRegistry::invalidate`] is called;
//! install and uninstall invalidate it after changing any manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::library::natural_cmp;
use crate::manifest::{self, VolumeManifest};

use super::catalog::Catalog;

/// An installed volume and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVolume {
    /// Library root holding the volume.
    pub root: PathBuf,
    /// Installed manifest file.
    pub manifest_path: PathBuf,
    pub manifest: VolumeManifest,
}

impl InstalledVolume {
    pub fn name(&self) -> &str {
        &self.manifest.volume_name
    }
}

#[derive(Debug)]
struct CacheEntry {
    roots: Vec<PathBuf>,
    product: String,
    volumes: Arc<Vec<InstalledVolume>>,
}

/// Cached view of installed volumes across library roots.
#[derive(Debug, Default)]
pub struct InstalledVolumeRegistry {
    cache: Mutex<Option<CacheEntry>>,
}

impl InstalledVolumeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installed volumes of `product` across `roots`, natural-sorted by name.
    ///
    /// Unreadable manifests are logged and skipped.
    pub fn installed_manifests(&self, roots: &[PathBuf], product: &str) -> Arc<Vec<InstalledVolume>> {
        // The lock is held while scanning so concurrent readers never race an
        // invalidation into caching a stale list.
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.as_ref() {
            if entry.roots == roots && entry.product == product {
                return Arc::clone(&entry.volumes);
            }
        }

        let volumes = Arc::new(scan_roots(roots, product));
        *cache = Some(CacheEntry {
            roots: roots.to_vec(),
            product: product.to_string(),
            volumes: Arc::clone(&volumes),
        });
        volumes
    }

    /// Names of installed volumes of `product`, merged across roots.
    pub fn list_installed(&self, roots: &[PathBuf], product: &str) -> Vec<String> {
        let volumes = self.installed_manifests(roots, product);
        let mut names: Vec<String> = volumes.iter().map(|v| v.name().to_string()).collect();
        names.dedup();
        names
    }

    /// Find an installed volume by name.
    pub fn find(&self, roots: &[PathBuf], product: &str, volume: &str) -> Option<InstalledVolume> {
        self.installed_manifests(roots, product)
            .iter()
            .find(|v| v.name() == volume)
            .cloned()
    }

    /// Drop the cached view.
    pub fn invalidate(&self) {
        if self.cache.lock().take().is_some() {
            debug!("Installed volume registry invalidated");
        }
    }
}

fn scan_roots(roots: &[PathBuf], product: &str) -> Vec<InstalledVolume> {
    let mut volumes = Vec::new();
    for root in roots {
        volumes.extend(installed_in_root(root).into_iter().filter(|v| v.manifest.product == product));
    }
    volumes.sort_by(|a, b| natural_cmp(a.name(), b.name()).then_with(|| a.root.cmp(&b.root)));
    debug!(roots = roots.len(), volumes = volumes.len(), "Scanned installed volumes");
    volumes
}

/// Every readable installed manifest of one root, regardless of product.
pub fn installed_in_root(root: &Path) -> Vec<InstalledVolume> {
    manifest::installed_manifest_files(root)
        .into_iter()
        .filter_map(|path| match manifest::read_manifest(&path) {
            Ok(manifest) => Some(InstalledVolume {
                root: root.to_path_buf(),
                manifest_path: path,
                manifest,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable installed manifest");
                None
            }
        })
        .collect()
}

/// Difference between the catalog and what is installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDelta {
    /// Catalog volumes of the product.
    pub catalog_count: usize,
    /// Installed volumes of the product.
    pub installed_count: usize,
    /// Catalog volumes not installed, natural-sorted.
    pub missing: Vec<String>,
}

impl CatalogDelta {
    /// True when the catalog offers volumes that are not installed.
    pub fn updates_available(&self) -> bool {
        !self.missing.is_empty() || self.catalog_count > self.installed_count
    }
}

/// Compare installed volume names against the catalog entries of `product`.
pub fn compare_against_catalog(installed: &[String], catalog: &Catalog, product: &str) -> CatalogDelta {
    let offered: Vec<&VolumeManifest> = catalog.for_product(product).collect();
    let mut missing: Vec<String> = offered
        .iter()
        .filter(|m| !installed.iter().any(|name| name == &m.volume_name))
        .map(|m| m.volume_name.clone())
        .collect();
    missing.sort_by(|a, b| natural_cmp(a, b));

    CatalogDelta {
        catalog_count: offered.len(),
        installed_count: installed.len(),
        missing,
    }
}
