//! Library trees: scanning, roots and naming.
//!
//! ```text
//! <root>/
//! ├── ._data/                    control directory (see crate::manifest)
//! └── {category}/
//!     └── {asset}/
//!         ├── data/              shared bundle (metadata, previews)
//!         ├── 2k/                variant
//!         └── 4k/                variant
//! ```

mod naming;
mod root;
mod scanner;

pub use naming::{natural_cmp, tier_for_variant, volume_index, volume_name, MAIN_TIER};
pub use root::{LibraryError, LibraryRoot};
pub use scanner::{AssetKey, AssetUnit, LibraryScan, LibraryScanner, ScanError, ScannedFile};
