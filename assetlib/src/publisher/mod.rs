//! Volume publisher: packs a library tree into distributable archives.
//!
//! # Overview
//!
//! The publisher workflow:
//! 1. Scan the source library ([`crate::library::LibraryScanner`])
//! 2. Pack the scan into size-bounded volumes ([`VolumePacker`])
//! 3. Aggregate the standalone manifests into a catalog ([`build_catalog`])
//!
//! Re-running the workflow against the same output directory is additive:
//! files already held by an existing archive of the same tier are never
//! packed again, and new volumes continue the existing numbering.
//!
//! # Example
//!
//! ```ignore
//! use assetlib::library::LibraryScanner;
//! use assetlib::publisher::{build_catalog, PackOptions, VolumePacker};
//!
//! let scan = LibraryScanner::new().scan("/path/to/library".as_ref())?;
//! let report = VolumePacker::new().pack(&scan, &PackOptions::new("/path/to/dist", identity))?;
//! build_catalog("/path/to/dist".as_ref())?;
//! println!("Packed {} volumes", report.volumes.len());
//! ```

mod archive;
mod catalog;
mod error;
mod estimate;
mod packer;

pub use archive::{archive_file_name, PackedVolume};
pub use catalog::{build_catalog, CATALOG_FILE};
pub use error::{PublishError, PublishResult};
pub use estimate::{compressed_size, SizeEstimator};
pub use packer::{PackOptions, PackReport, VolumePacker, MAX_NAME_PROBES};
