//! Configuration for the volume manager.

use std::path::{Path, PathBuf};

use crate::config::{ConfigFile, DEFAULT_PRODUCT};
use crate::manifest::LibraryType;

use super::error::{ManagerError, ManagerResult};

/// Where the default, user and expansion libraries live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLayout {
    /// Root of the default library.
    pub default_root: PathBuf,
    /// Root of the user library, if configured.
    pub user_root: Option<PathBuf>,
    /// Expansion library roots.
    pub expansion_roots: Vec<PathBuf>,
}

impl LibraryLayout {
    pub fn new(default_root: impl Into<PathBuf>) -> Self {
        Self {
            default_root: default_root.into(),
            user_root: None,
            expansion_roots: Vec::new(),
        }
    }

    pub fn with_user_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_root = Some(path.into());
        self
    }

    pub fn with_expansion_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.add_expansion_root(path.into());
        self
    }

    /// Register an expansion root unless it is already known.
    pub fn add_expansion_root(&mut self, path: PathBuf) -> bool {
        if self.expansion_roots.contains(&path) {
            return false;
        }
        self.expansion_roots.push(path);
        true
    }

    /// Every configured root: default, then user, then expansions.
    pub fn all_roots(&self) -> Vec<PathBuf> {
        std::iter::once(self.default_root.clone())
            .chain(self.user_root.clone())
            .chain(self.expansion_roots.iter().cloned())
            .collect()
    }

    /// Kind of library a configured root is.
    pub fn kind_of(&self, root: &Path) -> Option<LibraryType> {
        if root == self.default_root {
            Some(LibraryType::Default)
        } else if self.user_root.as_deref() == Some(root) {
            Some(LibraryType::User)
        } else if self.expansion_roots.iter().any(|r| r == root) {
            Some(LibraryType::Expansion)
        } else {
            None
        }
    }
}

/// Options for one install run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Re-extract files that already exist with the expected size.
    pub overwrite: bool,
    /// Keep source archives after a volume installs cleanly.
    pub keep_archives: bool,
}

impl InstallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_keep_archives(mut self, keep: bool) -> Self {
        self.keep_archives = keep;
        self
    }
}

/// Configuration for the volume manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Product volumes must belong to.
    pub product: String,
    /// Library locations.
    pub layout: LibraryLayout,
    /// Host installation directory; no library may live inside it.
    pub install_dir: Option<PathBuf>,
    /// Defaults for install runs.
    pub install: InstallOptions,
}

impl ManagerConfig {
    /// Create a configuration for a product with the given default library root.
    pub fn new(product: impl Into<String>, default_root: impl Into<PathBuf>) -> Self {
        Self {
            product: product.into(),
            layout: LibraryLayout::new(default_root),
            install_dir: None,
            install: InstallOptions::default(),
        }
    }

    /// Derive the manager configuration from the user config file.
    ///
    /// # Errors
    ///
    /// Returns an error if no default library root is configured.
    pub fn from_config_file(config: &ConfigFile) -> ManagerResult<Self> {
        let library = &config.library;
        let default_root = library.default_root.clone().ok_or_else(|| {
            ManagerError::InvalidConfig(
                "library.default_root is not set (run `assetlib init` first)".to_string(),
            )
        })?;

        let mut layout = LibraryLayout::new(default_root);
        layout.user_root = library.user_root.clone();
        for root in &library.expansion_roots {
            layout.add_expansion_root(root.clone());
        }

        let product = if library.product.is_empty() {
            DEFAULT_PRODUCT.to_string()
        } else {
            library.product.clone()
        };

        Ok(Self {
            product,
            layout,
            install_dir: library.install_dir.clone(),
            install: InstallOptions {
                overwrite: config.install.overwrite,
                keep_archives: config.install.keep_archives,
            },
        })
    }

    pub fn with_user_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.layout.user_root = Some(path.into());
        self
    }

    pub fn with_expansion_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.layout.add_expansion_root(path.into());
        self
    }

    pub fn with_install_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(path.into());
        self
    }

    pub fn with_install_options(mut self, options: InstallOptions) -> Self {
        self.install = options;
        self
    }
}
