//! Installation job state.
//!
//! A job is produced by [`super::VolumeInstaller::prepare`] and consumed by
//! [`super::VolumeInstaller::run`]. Progress is published through atomic
//! counters so a UI thread can poll it while the install runs.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::manifest::{LibraryInfo, VolumeManifest};

use super::config::InstallOptions;

/// Shared cancellation signal.
///
/// Clones refer to the same flag, so a signal handler can hold one while the
/// installer checks another.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Withdraw a cancellation request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Progress counters shared with observers.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    files_copied: AtomicU64,
    total_files: AtomicU64,
    packed_files: AtomicU64,
    unpacked_files: AtomicU64,
    bytes_copied: AtomicU64,
}

/// Point-in-time copy of [`ProgressCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Files present at their destination (already satisfied or extracted).
    pub files_copied: u64,
    /// Files the job accounts for, after de-duplication.
    pub total_files: u64,
    /// Archives in the plan.
    pub packed_files: u64,
    /// Archives fully processed.
    pub unpacked_files: u64,
    /// Bytes extracted so far.
    pub bytes_copied: u64,
}

impl ProgressSnapshot {
    /// Completed fraction of the file count (1.0 for an empty job).
    pub fn fraction(&self) -> f64 {
        if self.total_files == 0 {
            1.0
        } else {
            self.files_copied as f64 / self.total_files as f64
        }
    }
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn reset(&self, total_files: u64, satisfied: u64, archives: u64) {
        self.total_files.store(total_files, Ordering::SeqCst);
        self.files_copied.store(satisfied, Ordering::SeqCst);
        self.packed_files.store(archives, Ordering::SeqCst);
        self.unpacked_files.store(0, Ordering::SeqCst);
        self.bytes_copied.store(0, Ordering::SeqCst);
    }

    pub(super) fn file_copied(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::SeqCst);
        self.bytes_copied.fetch_add(bytes, Ordering::SeqCst);
    }

    pub(super) fn archive_unpacked(&self) {
        self.unpacked_files.fetch_add(1, Ordering::SeqCst);
    }

    pub fn files_copied(&self) -> u64 {
        self.files_copied.load(Ordering::SeqCst)
    }

    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::SeqCst)
    }

    pub fn packed_files(&self) -> u64 {
        self.packed_files.load(Ordering::SeqCst)
    }

    pub fn unpacked_files(&self) -> u64 {
        self.unpacked_files.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_copied: self.files_copied(),
            total_files: self.total_files(),
            packed_files: self.packed_files(),
            unpacked_files: self.unpacked_files(),
            bytes_copied: self.bytes_copied.load(Ordering::SeqCst),
        }
    }
}

/// One archive entry to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Library-relative path (also the archive entry name).
    pub relative: String,
    /// Absolute destination path.
    pub destination: PathBuf,
    /// Expected size in bytes.
    pub size: u64,
}

/// Extraction plan for one archive.
#[derive(Debug, Clone)]
pub struct VolumePlan {
    pub archive: PathBuf,
    pub manifest: VolumeManifest,
    /// Library root the volume installs into.
    pub root: PathBuf,
    /// Identity written to the root if it has none yet.
    pub root_info: LibraryInfo,
    /// Entries still to extract.
    pub files_to_copy: Vec<PlannedFile>,
    /// Entries already present with the expected size.
    pub satisfied: u64,
    /// Entries covered by an earlier archive of the same job.
    pub deferred: u64,
    /// Earlier volumes that extract this volume's deferred entries.
    pub depends_on: BTreeSet<String>,
}

impl VolumePlan {
    pub fn volume_name(&self) -> &str {
        &self.manifest.volume_name
    }

    pub fn planned_bytes(&self) -> u64 {
        self.files_to_copy.iter().map(|f| f.size).sum()
    }
}

/// An archive rejected during preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadArchive {
    pub path: PathBuf,
    pub reason: String,
}

/// A file that failed to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    /// Library-relative path, or the archive path for archive-level failures.
    pub path: String,
    pub reason: String,
}

/// State of one install operation.
#[derive(Debug)]
pub struct InstallationJob {
    pub(super) plans: Vec<VolumePlan>,
    pub(super) bad_archives: Vec<BadArchive>,
    pub(super) new_roots: Vec<PathBuf>,
    pub(super) options: InstallOptions,
    pub(super) counters: Arc<ProgressCounters>,
    pub(super) cancel: CancelFlag,
    pub(super) errors: BTreeMap<String, Vec<FileError>>,
    /// Destinations written by earlier, cancelled runs of this job.
    pub(super) extracted: HashSet<PathBuf>,
    pub(super) interrupted: bool,
    pub(super) finished: bool,
}

impl InstallationJob {
    pub(super) fn new(
        plans: Vec<VolumePlan>,
        bad_archives: Vec<BadArchive>,
        new_roots: Vec<PathBuf>,
        options: InstallOptions,
    ) -> Self {
        let total: u64 = plans
            .iter()
            .map(|p| p.files_to_copy.len() as u64 + p.satisfied)
            .sum();
        let satisfied: u64 = plans.iter().map(|p| p.satisfied).sum();
        let counters = Arc::new(ProgressCounters::new());
        counters.reset(total, satisfied, plans.len() as u64);

        Self {
            plans,
            bad_archives,
            new_roots,
            options,
            counters,
            cancel: CancelFlag::new(),
            errors: BTreeMap::new(),
            extracted: HashSet::new(),
            interrupted: false,
            finished: false,
        }
    }

    pub fn plans(&self) -> &[VolumePlan] {
        &self.plans
    }

    pub fn bad_archives(&self) -> &[BadArchive] {
        &self.bad_archives
    }

    /// Expansion roots allocated for this job.
    pub fn new_roots(&self) -> &[PathBuf] {
        &self.new_roots
    }

    pub fn options(&self) -> &InstallOptions {
        &self.options
    }

    /// Shared progress counters.
    pub fn counters(&self) -> Arc<ProgressCounters> {
        Arc::clone(&self.counters)
    }

    /// Cancellation handle for this job.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Per-volume file errors recorded so far.
    pub fn errors(&self) -> &BTreeMap<String, Vec<FileError>> {
        &self.errors
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn files_to_copy(&self) -> usize {
        self.plans.iter().map(|p| p.files_to_copy.len()).sum()
    }

    pub fn satisfied(&self) -> u64 {
        self.plans.iter().map(|p| p.satisfied).sum()
    }

    pub fn planned_bytes(&self) -> u64 {
        self.plans.iter().map(VolumePlan::planned_bytes).sum()
    }
}
