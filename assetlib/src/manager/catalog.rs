//! Volume catalog and its sources.
//!
//! A catalog maps volume names to their manifests (`{volume_name: manifest}`).
//! It is produced by [`crate::publisher::build_catalog`] and consumed here to
//! tell users which volumes they are missing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::manifest::{self, VolumeManifest};

use super::traits::CatalogSource;
use super::{ManagerError, ManagerResult};

/// Default HTTP request timeout (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Volume name to manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    volumes: BTreeMap<String, VolumeManifest>,
}

impl Catalog {
    /// Parse and validate catalog JSON. `source` names the origin in errors.
    pub fn from_json(text: &str, source: &str) -> ManagerResult<Self> {
        let catalog: Self =
            serde_json::from_str(text).map_err(|e| ManagerError::CatalogParseFailed {
                source: source.to_string(),
                reason: e.to_string(),
            })?;

        for (name, manifest) in &catalog.volumes {
            manifest
                .validate()
                .map_err(|e| ManagerError::CatalogParseFailed {
                    source: source.to_string(),
                    reason: e.to_string(),
                })?;
            if name != &manifest.volume_name {
                return Err(ManagerError::CatalogParseFailed {
                    source: source.to_string(),
                    reason: format!(
                        "entry '{}' holds the manifest of '{}'",
                        name, manifest.volume_name
                    ),
                });
            }
        }
        Ok(catalog)
    }

    /// Add or replace a volume's entry.
    pub fn insert(&mut self, manifest: VolumeManifest) {
        self.volumes.insert(manifest.volume_name.clone(), manifest);
    }

    pub fn get(&self, volume: &str) -> Option<&VolumeManifest> {
        self.volumes.get(volume)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VolumeManifest> {
        self.volumes.values()
    }

    /// Entries belonging to `product`.
    pub fn for_product<'a>(&'a self, product: &'a str) -> impl Iterator<Item = &'a VolumeManifest> {
        self.volumes.values().filter(move |m| m.product == product)
    }

    pub fn volume_names(&self) -> impl Iterator<Item = &str> {
        self.volumes.keys().map(String::as_str)
    }
}

/// Catalog read from a local file.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for FileCatalogSource {
    fn fetch(&self) -> ManagerResult<Catalog> {
        let text = fs::read_to_string(&self.path).map_err(|e| ManagerError::CatalogFetchFailed {
            source: self.location(),
            reason: e.to_string(),
        })?;
        Catalog::from_json(&text, &self.location())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Catalog fetched over HTTP, with an optional on-disk copy of the last
/// good response used when the server cannot be reached.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    url: String,
    cache_file: Option<PathBuf>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCatalogSource")
            .field("url", &self.url)
            .field("cache_file", &self.cache_file)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpCatalogSource {
    /// Create a source for `url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(url: impl Into<String>) -> ManagerResult<Self> {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a source for `url` with a custom timeout.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> ManagerResult<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("assetlib/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ManagerError::CatalogFetchFailed {
                source: url.clone(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url,
            cache_file: None,
            timeout,
        })
    }

    /// Keep a copy of each good response at `path`.
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    fn fetch_text(&self) -> ManagerResult<String> {
        let response = self.client.get(&self.url).send().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                e.to_string()
            };
            ManagerError::CatalogFetchFailed {
                source: self.url.clone(),
                reason,
            }
        })?;

        if !response.status().is_success() {
            return Err(ManagerError::CatalogFetchFailed {
                source: self.url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        response.text().map_err(|e| ManagerError::CatalogFetchFailed {
            source: self.url.clone(),
            reason: e.to_string(),
        })
    }

    fn store_cache(&self, catalog: &Catalog) {
        let Some(path) = &self.cache_file else {
            return;
        };
        match manifest::write_json(path, catalog) {
            Ok(()) => debug!(path = %path.display(), "Cached catalog"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to cache catalog"),
        }
    }

    fn load_cache(&self, path: &Path) -> ManagerResult<Catalog> {
        let text = fs::read_to_string(path).map_err(|e| ManagerError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Catalog::from_json(&text, &path.display().to_string())
    }
}

impl CatalogSource for HttpCatalogSource {
    fn fetch(&self) -> ManagerResult<Catalog> {
        let fetched = self
            .fetch_text()
            .and_then(|text| Catalog::from_json(&text, &self.url));

        match fetched {
            Ok(catalog) => {
                info!(url = %self.url, volumes = catalog.len(), "Fetched catalog");
                self.store_cache(&catalog);
                Ok(catalog)
            }
            Err(err) => {
                let Some(path) = &self.cache_file else {
                    return Err(err);
                };
                warn!(url = %self.url, error = %err, "Catalog fetch failed, using cached copy");
                self.load_cache(path).map_err(|_| err)
            }
        }
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}
