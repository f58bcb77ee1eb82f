//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use assetlib::config::ConfigFileError;
use assetlib::library::{LibraryError, ScanError};
use assetlib::manager::ManagerError;
use assetlib::publisher::PublishError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load or save the config file
    ConfigFile(ConfigFileError),
    /// Install, uninstall or catalog operation failed
    Manager(ManagerError),
    /// Packing or catalog build failed
    Publish(PublishError),
    /// Library root could not be created or opened
    Library(LibraryError),
    /// Library could not be scanned
    Scan(ScanError),
    /// Failed to read an archive path argument
    ReadPath { path: PathBuf, error: std::io::Error },
    /// Installed volumes do not match their manifests
    VerifyFailed(usize),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Manager(ManagerError::InsufficientSpace { .. }) => {
                eprintln!();
                eprintln!("Free some space on the destination drive, or register an");
                eprintln!("expansion library on another drive with: assetlib init --type expansion <path>");
            }
            CliError::Manager(ManagerError::InvalidConfig(_)) => {
                eprintln!();
                eprintln!("Create the default library first with: assetlib init <path>");
            }
            CliError::Publish(PublishError::MalformedAssets(_)) => {
                eprintln!();
                eprintln!("Every asset folder needs at least one variant folder (e.g. 4k/)");
                eprintln!("besides its data/ folder.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Manager(e) => write!(f, "{}", e),
            CliError::Publish(e) => write!(f, "{}", e),
            CliError::Library(e) => write!(f, "{}", e),
            CliError::Scan(e) => write!(f, "Failed to scan library: {}", e),
            CliError::ReadPath { path, error } => {
                write!(f, "Failed to read '{}': {}", path.display(), error)
            }
            CliError::VerifyFailed(count) => {
                write!(f, "{} installed volume(s) failed verification", count)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Manager(e) => Some(e),
            CliError::Publish(e) => Some(e),
            CliError::Library(e) => Some(e),
            CliError::Scan(e) => Some(e),
            CliError::ReadPath { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}

impl From<PublishError> for CliError {
    fn from(e: PublishError) -> Self {
        CliError::Publish(e)
    }
}

impl From<LibraryError> for CliError {
    fn from(e: LibraryError) -> Self {
        CliError::Library(e)
    }
}

impl From<ScanError> for CliError {
    fn from(e: ScanError) -> Self {
        CliError::Scan(e)
    }
}
