//! Configuration for assetlib components.
//!
//! User settings live in `~/.assetlib/config.ini` and are loaded into a
//! [`ConfigFile`]. Runtime components take narrower structs derived from it
//! ([`crate::manager::ManagerConfig`], [`crate::publisher::PackOptions`]).

mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CatalogSettings, ConfigFile, InstallSettings, LibrarySettings, LoggingSettings,
    PackerSettings, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE, DEFAULT_MAX_VOLUME_SIZE, DEFAULT_PRODUCT,
};
pub use size::{display_size, format_size, parse_size, SizeParseError};
