//! Volume and library control documents.
//!
//! Every library root carries a `._data` control directory:
//!
//! ```text
//! ._data/
//! ├── library_info.json           identity of the root
//! ├── zips_size_register.json     compressed-size cache (source roots only)
//! └── ._volumes_installed/
//!     └── {volume_name}.json      one manifest per installed volume
//! ```
//!
//! The manifest embedded in an archive and the installed copy are the same
//! document.

mod error;
mod library_info;
pub mod paths;
mod size_register;
mod store;
mod volume;

pub use error::{ManifestError, ManifestResult};
pub use library_info::LibraryInfo;
pub use size_register::SizeRegister;
pub use store::{installed_manifest_files, read_json, read_manifest, write_json, write_manifest};
pub use volume::{LibraryType, ManifestFile, VolumeIdentity, VolumeManifest, SELF_ENTRY_ORDINAL};
