//! Configuration file handling for ~/.assetlib/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], parsing in [`super::parser`],
//! and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.assetlib/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }
}

/// Get the path to the config directory (~/.assetlib).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".assetlib")
}

/// Get the path to the config file (~/.assetlib/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{DEFAULT_MAX_VOLUME_SIZE, DEFAULT_PRODUCT};

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.library.product, DEFAULT_PRODUCT);
        assert!(config.library.default_root.is_none());
        assert!(config.library.expansion_roots.is_empty());
        assert!(!config.install.overwrite);
        assert!(!config.install.keep_archives);
        assert_eq!(config.packer.max_volume_size, DEFAULT_MAX_VOLUME_SIZE);
        assert!(config.catalog.url.is_none());
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("missing.ini")).unwrap();

        assert_eq!(config.library.product, DEFAULT_PRODUCT);
        assert_eq!(config.packer.max_volume_size, DEFAULT_MAX_VOLUME_SIZE);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.library.product = "HdriStudio".to_string();
        config.library.default_root = Some(PathBuf::from("/data/library"));
        config.library.expansion_roots = vec![
            PathBuf::from("/data/Expansion One"),
            PathBuf::from("/data/Expansion Two"),
        ];
        config.install.keep_archives = true;
        config.packer.max_volume_size = 512 * 1024 * 1024;
        config.packer.ignore_tier = true;
        config.catalog.url = Some("https://example.com/volumes.json".to_string());

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();

        assert_eq!(loaded.library.product, "HdriStudio");
        assert_eq!(
            loaded.library.default_root,
            Some(PathBuf::from("/data/library"))
        );
        assert_eq!(loaded.library.expansion_roots.len(), 2);
        assert_eq!(
            loaded.library.expansion_roots[1],
            PathBuf::from("/data/Expansion Two")
        );
        assert!(loaded.install.keep_archives);
        assert!(!loaded.install.overwrite);
        assert_eq!(loaded.packer.max_volume_size, 512 * 1024 * 1024);
        assert!(loaded.packer.ignore_tier);
        assert_eq!(
            loaded.catalog.url.as_deref(),
            Some("https://example.com/volumes.json")
        );
    }
}
