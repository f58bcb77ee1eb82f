//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;

/// Product name written into manifests when none is configured.
pub const DEFAULT_PRODUCT: &str = "AssetLib";

/// Default maximum compressed size of a single volume (2 GiB).
pub const DEFAULT_MAX_VOLUME_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Default log directory, relative to the config directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "assetlib.log";

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Library locations and product identity
    pub library: LibrarySettings,
    /// Install behaviour
    pub install: InstallSettings,
    /// Volume packer settings
    pub packer: PackerSettings,
    /// Online catalog settings
    pub catalog: CatalogSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Library configuration.
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    /// Product name volumes must match to be installed.
    pub product: String,
    /// Root of the default library.
    pub default_root: Option<PathBuf>,
    /// Root of the user library.
    pub user_root: Option<PathBuf>,
    /// Registered expansion library roots.
    pub expansion_roots: Vec<PathBuf>,
    /// Directory the host application is installed in; libraries may not live here.
    pub install_dir: Option<PathBuf>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_string(),
            default_root: None,
            user_root: None,
            expansion_roots: Vec::new(),
            install_dir: None,
        }
    }
}

/// Install configuration.
#[derive(Debug, Clone, Default)]
pub struct InstallSettings {
    /// Re-extract files even when they already exist with the right size.
    pub overwrite: bool,
    /// Keep source archives after a successful install.
    pub keep_archives: bool,
}

/// Packer configuration.
#[derive(Debug, Clone)]
pub struct PackerSettings {
    /// Maximum estimated compressed bytes per volume.
    pub max_volume_size: u64,
    /// Put every tier into a single running bucket.
    pub ignore_tier: bool,
    /// Worker threads for estimation and archive writing (0 = one per core).
    pub threads: usize,
}

impl Default for PackerSettings {
    fn default() -> Self {
        Self {
            max_volume_size: DEFAULT_MAX_VOLUME_SIZE,
            ignore_tier: false,
            threads: 0,
        }
    }
}

/// Online catalog configuration.
#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    /// URL of the volumes catalog JSON.
    pub url: Option<String>,
    /// Where the last fetched catalog is cached.
    pub cache_file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Directory for log files.
    pub directory: PathBuf,
    /// Log file name.
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: super::file::config_directory().join(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}
