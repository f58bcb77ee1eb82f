//! Integrity check of an installed volume.

use std::fs;
use std::io;
use std::path::Path;

use crate::manifest::{paths, VolumeManifest};

use super::{ManagerError, ManagerResult};

/// Result of checking one installed volume against its manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub volume: String,
    /// Files examined.
    pub checked: u64,
    /// Library-relative paths that do not exist.
    pub missing: Vec<String>,
    /// `(path, expected, actual)` for files of the wrong size.
    pub mismatched: Vec<(String, u64, u64)>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

/// Compare the files of an installed volume with its manifest.
///
/// # Errors
///
/// Returns an error only when a file exists but its metadata cannot be read.
pub fn verify_volume(root: &Path, manifest: &VolumeManifest) -> ManagerResult<VerifyReport> {
    let mut report = VerifyReport {
        volume: manifest.volume_name.clone(),
        ..Default::default()
    };

    for file in manifest.payload_files() {
        report.checked += 1;
        let path = paths::resolve(root, &file.file_path);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() == file.file_size => {}
            Ok(meta) if meta.is_file() => {
                report
                    .mismatched
                    .push((file.file_path.clone(), file.file_size, meta.len()));
            }
            Ok(_) => report.missing.push(file.file_path.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.missing.push(file.file_path.clone())
            }
            Err(e) => return Err(ManagerError::ReadFailed { path, source: e }),
        }
    }
    Ok(report)
}
