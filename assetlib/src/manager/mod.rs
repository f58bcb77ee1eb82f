//! Volume manager: installs, inspects and removes volumes in local libraries.
//!
//! # Overview
//!
//! The install workflow:
//! 1. Prepare a job from a set of archives ([`VolumeInstaller::prepare`])
//! 2. Run it, polling [`ProgressCounters`] or a per-file callback ([`VolumeInstaller::run`])
//! 3. Inspect the outcome ([`InstallReport::summary`])
//!
//! Installed volumes are recorded as manifests in each library root and
//! read back through the [`InstalledVolumeRegistry`], which also drives
//! [`VolumeUninstaller`] and catalog comparison.
//!
//! # Example
//!
//! ```ignore
//! use assetlib::manager::{InstallOptions, ManagerConfig, VolumeInstaller};
//!
//! let installer = VolumeInstaller::new(ManagerConfig::new("Studio", "/libs/Default"));
//! let mut job = installer.prepare(&archives, &InstallOptions::default())?;
//! let report = installer.run(&mut job, None)?;
//! println!("{}", report.summary());
//! ```

mod catalog;
mod config;
mod error;
mod extractor;
mod installer;
mod job;
mod registry;
mod routing;
mod space;
mod traits;
mod uninstaller;
mod validate;
mod verify;

pub use catalog::{Catalog, FileCatalogSource, HttpCatalogSource};
pub use config::{InstallOptions, LibraryLayout, ManagerConfig};
pub use error::{ManagerError, ManagerResult};
pub use extractor::ZipExtractor;
pub use installer::{FileProgress, InstallReport, VolumeInstaller};
pub use job::{
    BadArchive, CancelFlag, FileError, InstallationJob, PlannedFile, ProgressCounters,
    ProgressSnapshot, VolumePlan,
};
pub use registry::{
    compare_against_catalog, installed_in_root, CatalogDelta, InstalledVolume,
    InstalledVolumeRegistry,
};
pub use routing::{DestinationRouter, MAX_ROOT_PROBES};
pub use space::{existing_ancestor, StatvfsProbe};
pub use traits::{ArchiveExtractor, CatalogSource, SpaceProbe};
pub use uninstaller::{UninstallReport, VolumeUninstaller};
pub use validate::{validate_destination, validate_distinct, validate_layout, validate_new_root};
pub use verify::{verify_volume, VerifyReport};
