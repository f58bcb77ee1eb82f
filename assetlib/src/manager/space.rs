//! Free-space queries.

use std::io;
use std::path::{Path, PathBuf};

use super::traits::SpaceProbe;

/// [`SpaceProbe`] backed by `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl StatvfsProbe {
    pub fn new() -> Self {
        Self
    }
}

impl SpaceProbe for StatvfsProbe {
    fn available_space(&self, path: &Path) -> io::Result<u64> {
        statvfs_available(&existing_ancestor(path))
    }

    fn device_id(&self, path: &Path) -> io::Result<u64> {
        device_of(&existing_ancestor(path))
    }
}

/// Nearest ancestor of `path` (or `path` itself) that exists.
///
/// Destination roots may not exist before an install creates them.
pub fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)] // statvfs field types vary by platform
fn statvfs_available(path: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // SAFETY: c_path is NUL-terminated and stat points to writable memory
    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };

    if result == 0 {
        // SAFETY: statvfs succeeded, stat is now initialized
        let stat = unsafe { stat.assume_init() };
        Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn statvfs_available(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "statvfs not available on this platform",
    ))
}

#[cfg(unix)]
fn device_of(path: &Path) -> io::Result<u64> {
    use std::os::unix::fs::MetadataExt;
    Ok(std::fs::metadata(path)?.dev())
}

#[cfg(not(unix))]
fn device_of(_path: &Path) -> io::Result<u64> {
    Ok(0)
}
