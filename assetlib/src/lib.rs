//! assetlib - Asset library packaging and installation
//!
//! This library splits a large tree of binary assets into size-bounded,
//! self-describing archive volumes, and installs, verifies and uninstalls
//! those volumes against local library folders.
//!
//! - [`library`]: library roots and the `category/asset/variant` tree scanner
//! - [`manifest`]: volume manifests and the `._data` control files
//! - [`publisher`]: packing a library into volumes and building the catalog
//! - [`manager`]: installing, listing, verifying and removing volumes
//! - [`config`] and [`logging`]: user configuration and tracing setup

pub mod config;
pub mod library;
pub mod logging;
pub mod manager;
pub mod manifest;
pub mod publisher;

/// Crate version, as recorded in client user agents and CLI output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_not_empty() {
        assert!(!VERSION.is_empty(), "Version should not be empty");
    }
}
