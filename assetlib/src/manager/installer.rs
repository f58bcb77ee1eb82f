//! Volume installer: incremental, resumable extraction of volume archives.
//!
//! This module orchestrates the installation workflow:
//! 1. Read the manifest embedded in each archive
//! 2. Route each volume to its library root
//! 3. Plan only the files that are not already in place
//! 4. Check free space for the planned bytes on every filesystem
//! 5. Extract volume by volume, recording per-file errors
//! 6. Record installed manifests and clean up source archives
//!
//! Preparation never touches the library. A cancelled run leaves every file
//! it finished in place, so preparing the same archives again resumes where
//! the previous run stopped.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::display_size;
use crate::library::LibraryRoot;
use crate::manifest::{self, paths, LibraryInfo, LibraryType, VolumeManifest};

use super::config::{InstallOptions, LibraryLayout, ManagerConfig};
use super::error::{ManagerError, ManagerResult};
use super::extractor::ZipExtractor;
use super::job::{
    BadArchive, FileError, InstallationJob, PlannedFile, ProgressSnapshot, VolumePlan,
};
use super::registry::InstalledVolumeRegistry;
use super::routing::DestinationRouter;
use super::space::StatvfsProbe;
use super::traits::{ArchiveExtractor, SpaceProbe};
use super::validate::{validate_destination, validate_layout};

/// Progress of a single extracted file, passed to the run callback.
#[derive(Debug, Clone)]
pub struct FileProgress<'a> {
    pub volume: &'a str,
    pub file: &'a PlannedFile,
    /// Error text if the file failed.
    pub error: Option<&'a str>,
    /// Counters after this file.
    pub snapshot: ProgressSnapshot,
}

/// Outcome of [`VolumeInstaller::run`].
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Volumes whose installed manifest was written.
    pub installed: Vec<String>,
    /// Volumes with file errors; their archives are kept.
    pub failed: BTreeMap<String, Vec<FileError>>,
    pub bad_archives: Vec<BadArchive>,
    /// Expansion roots created by this run.
    pub new_roots: Vec<PathBuf>,
    pub files_copied: u64,
    pub total_files: u64,
    pub bytes_copied: u64,
    pub archives_deleted: usize,
    pub cancelled: bool,
    pub finished: bool,
}

impl InstallReport {
    /// One-line result for display.
    pub fn summary(&self) -> String {
        if self.cancelled {
            return format!(
                "Installation cancelled: {} of {} files in place. Install again to resume.",
                self.files_copied, self.total_files
            );
        }
        if self.failed.is_empty() && self.bad_archives.is_empty() {
            return format!(
                "Installed {} volume(s): {} of {} files in place ({} extracted).",
                self.installed.len(),
                self.files_copied,
                self.total_files,
                display_size(self.bytes_copied)
            );
        }
        let failed_files: usize = self.failed.values().map(Vec::len).sum();
        format!(
            "Installed {} volume(s) with errors: {} volume(s) failed ({} file(s)), {} archive(s) rejected.",
            self.installed.len(),
            self.failed.len(),
            failed_files,
            self.bad_archives.len()
        )
    }
}

/// Marks the installer busy for the lifetime of the guard.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> ManagerResult<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ManagerError::InstallInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Installs volume archives into the configured libraries.
pub struct VolumeInstaller {
    product: String,
    layout: RwLock<LibraryLayout>,
    install_dir: Option<PathBuf>,
    defaults: InstallOptions,
    extractor: Box<dyn ArchiveExtractor>,
    space: Box<dyn SpaceProbe>,
    registry: Arc<InstalledVolumeRegistry>,
    running: AtomicBool,
}

impl std::fmt::Debug for VolumeInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeInstaller")
            .field("product", &self.product)
            .field("layout", &*self.layout.read())
            .field("install_dir", &self.install_dir)
            .field("running", &self.is_running())
            .finish()
    }
}

impl VolumeInstaller {
    /// Create an installer reading ZIP archives and probing space with `statvfs`.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            product: config.product,
            layout: RwLock::new(config.layout),
            install_dir: config.install_dir,
            defaults: config.install,
            extractor: Box::new(ZipExtractor::new()),
            space: Box::new(StatvfsProbe::new()),
            registry: Arc::new(InstalledVolumeRegistry::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_space_probe(mut self, probe: impl SpaceProbe + 'static) -> Self {
        self.space = Box::new(probe);
        self
    }

    /// Share a registry with other components.
    pub fn with_registry(mut self, registry: Arc<InstalledVolumeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> Arc<InstalledVolumeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Current layout, including expansion roots created by earlier runs.
    pub fn layout(&self) -> LibraryLayout {
        self.layout.read().clone()
    }

    /// Install options from the configuration.
    pub fn default_options(&self) -> &InstallOptions {
        &self.defaults
    }

    /// True while a prepare or run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Build an installation job for `archives`.
    ///
    /// Archives that cannot be used are reported in the job rather than
    /// failing it. Nothing on disk is modified.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::InstallInProgress`] if another prepare or run is active
    /// - [`ManagerError::InvalidState`] if the configured layout is unsafe
    /// - [`ManagerError::NoValidArchives`] if every archive was rejected
    /// - [`ManagerError::InsufficientSpace`] if planned files do not fit
    pub fn prepare(
        &self,
        archives: &[PathBuf],
        options: &InstallOptions,
    ) -> ManagerResult<InstallationJob> {
        let _guard = RunGuard::acquire(&self.running)?;

        let layout = self.layout();
        validate_layout(&layout, self.install_dir.as_deref())?;
        let configured: HashSet<PathBuf> = layout.all_roots().into_iter().collect();
        let mut router = DestinationRouter::new(layout);

        let mut plans: Vec<VolumePlan> = Vec::new();
        let mut bad_archives: Vec<BadArchive> = Vec::new();
        let mut seen_volumes: HashSet<String> = HashSet::new();
        let mut claimed: HashMap<(PathBuf, String), String> = HashMap::new();

        for archive in archives {
            let reject = |reason: String| BadArchive {
                path: archive.clone(),
                reason,
            };

            let manifest = match self.extractor.read_manifest(archive) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(archive = %archive.display(), error = %e, "Rejected archive");
                    bad_archives.push(reject(e.to_string()));
                    continue;
                }
            };
            if manifest.product != self.product {
                bad_archives.push(reject(format!(
                    "volume {} belongs to product '{}', not '{}'",
                    manifest.volume_name, manifest.product, self.product
                )));
                continue;
            }
            if !seen_volumes.insert(manifest.volume_name.clone()) {
                bad_archives.push(reject(format!(
                    "volume {} is given more than once",
                    manifest.volume_name
                )));
                continue;
            }

            let root = match router
                .route(&manifest)
                .and_then(|root| validate_destination(&root, self.install_dir.as_deref()).map(|_| root))
            {
                Ok(root) => root,
                Err(e) => {
                    bad_archives.push(reject(e.to_string()));
                    continue;
                }
            };

            let plan = self.plan_volume(archive, manifest, root, options, &mut claimed);
            debug!(
                volume = %plan.volume_name(),
                root = %plan.root.display(),
                to_copy = plan.files_to_copy.len(),
                satisfied = plan.satisfied,
                deferred = plan.deferred,
                "Planned volume"
            );
            plans.push(plan);
        }

        if plans.is_empty() {
            return Err(ManagerError::NoValidArchives {
                rejected: bad_archives.len(),
            });
        }

        self.check_space(&plans)?;

        let new_roots: Vec<PathBuf> = router
            .allocated()
            .into_iter()
            .filter(|root| !configured.contains(root))
            .collect();
        let job = InstallationJob::new(plans, bad_archives, new_roots, options.clone());
        info!(
            volumes = job.plans().len(),
            rejected = job.bad_archives().len(),
            to_copy = job.files_to_copy(),
            satisfied = job.satisfied(),
            bytes = job.planned_bytes(),
            "Prepared installation"
        );
        Ok(job)
    }

    fn plan_volume(
        &self,
        archive: &Path,
        manifest: VolumeManifest,
        root: PathBuf,
        options: &InstallOptions,
        claimed: &mut HashMap<(PathBuf, String), String>,
    ) -> VolumePlan {
        let mut files_to_copy = Vec::new();
        let mut satisfied = 0u64;
        let mut deferred = 0u64;
        let mut depends_on = BTreeSet::new();

        for file in manifest.payload_files() {
            let key = (root.clone(), file.file_path.clone());
            if let Some(owner) = claimed.get(&key) {
                deferred += 1;
                depends_on.insert(owner.clone());
                continue;
            }
            claimed.insert(key, manifest.volume_name.clone());
            let destination = paths::resolve(&root, &file.file_path);
            if !options.overwrite && is_in_place(&destination, file.file_size) {
                satisfied += 1;
                continue;
            }
            files_to_copy.push(PlannedFile {
                relative: file.file_path.clone(),
                destination,
                size: file.file_size,
            });
        }

        VolumePlan {
            archive: archive.to_path_buf(),
            root_info: LibraryInfo::for_volume(&manifest),
            manifest,
            root,
            files_to_copy,
            satisfied,
            deferred,
            depends_on,
        }
    }

    /// Compare planned bytes with free space, per filesystem.
    fn check_space(&self, plans: &[VolumePlan]) -> ManagerResult<()> {
        let mut per_device: HashMap<u64, (PathBuf, u64)> = HashMap::new();
        for plan in plans {
            let bytes = plan.planned_bytes();
            if bytes == 0 {
                continue;
            }
            let device = self
                .space
                .device_id(&plan.root)
                .map_err(|e| space_error(&plan.root, e))?;
            per_device
                .entry(device)
                .or_insert_with(|| (plan.root.clone(), 0))
                .1 += bytes;
        }

        for (root, required) in per_device.into_values() {
            let available = self
                .space
                .available_space(&root)
                .map_err(|e| space_error(&root, e))?;
            debug!(
                root = %root.display(),
                required = required,
                available = available,
                "Checked free space"
            );
            if required > available {
                return Err(ManagerError::InsufficientSpace {
                    path: root,
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Extract a prepared job.
    ///
    /// Volumes are processed one at a time. The job's cancel flag is checked
    /// after every file; a cancelled run returns a report with
    /// `cancelled: true` and leaves the job unfinished. Running the same job
    /// again clears the cancellation and extracts only the files the earlier
    /// run did not write.
    ///
    /// A volume whose deferred entries belong to a volume that failed is
    /// reported as failed too, so its archive is kept for a retry.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InstallInProgress`] if another prepare or run
    /// is active, or [`ManagerError::InvalidState`] for a finished job.
    /// Per-file failures are reported, not returned.
    pub fn run(
        &self,
        job: &mut InstallationJob,
        on_file: Option<&dyn Fn(&FileProgress<'_>)>,
    ) -> ManagerResult<InstallReport> {
        let _guard = RunGuard::acquire(&self.running)?;
        if job.finished {
            return Err(ManagerError::InvalidState(
                "installation job has already finished".to_string(),
            ));
        }

        let counters = job.counters();
        let cancel = job.cancel_flag();
        if job.interrupted {
            cancel.reset();
            job.interrupted = false;
            info!(done = job.extracted.len(), "Resuming cancelled installation");
        }
        let options = job.options.clone();
        let mut report = InstallReport {
            bad_archives: job.bad_archives.clone(),
            ..Default::default()
        };

        for plan in &job.plans {
            if cancel.is_cancelled() {
                break;
            }
            let volume = plan.volume_name();
            if let Some(errors) = job.errors.get(volume) {
                // Processed by an earlier, cancelled run of this job.
                if !errors.is_empty() {
                    report.failed.insert(volume.to_string(), errors.clone());
                }
                continue;
            }
            let pending: Vec<PlannedFile> = plan
                .files_to_copy
                .iter()
                .filter(|f| !job.extracted.contains(&f.destination))
                .cloned()
                .collect();
            info!(
                volume = %volume,
                root = %plan.root.display(),
                files = pending.len(),
                "Installing volume"
            );

            let mut errors: Vec<FileError> = Vec::new();
            match LibraryRoot::open_or_init(&plan.root, plan.root_info.clone()) {
                Ok(root) => {
                    let is_expansion = root.info().library_type == LibraryType::Expansion;
                    if is_expansion && self.layout.write().add_expansion_root(plan.root.clone()) {
                        report.new_roots.push(plan.root.clone());
                    }
                }
                Err(e) => errors.push(FileError {
                    path: plan.root.display().to_string(),
                    reason: e.to_string(),
                }),
            }

            let mut stopped = false;
            let mut written: Vec<PathBuf> = Vec::new();
            if errors.is_empty() {
                let mut visit = |file: &PlannedFile, result: ManagerResult<u64>| {
                    let error = match result {
                        Ok(bytes) => {
                            counters.file_copied(bytes);
                            written.push(file.destination.clone());
                            None
                        }
                        Err(e) => {
                            warn!(volume = %volume, path = %file.relative, error = %e, "File failed");
                            let reason = e.to_string();
                            errors.push(FileError {
                                path: file.relative.clone(),
                                reason: reason.clone(),
                            });
                            Some(reason)
                        }
                    };
                    if let Some(callback) = on_file {
                        callback(&FileProgress {
                            volume,
                            file,
                            error: error.as_deref(),
                            snapshot: counters.snapshot(),
                        });
                    }
                    if cancel.is_cancelled() {
                        stopped = true;
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                };
                if let Err(e) =
                    self.extractor
                        .extract_files(&plan.archive, &pending, &mut visit)
                {
                    errors.push(FileError {
                        path: plan.archive.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }

            job.extracted.extend(written);

            if stopped {
                info!(volume = %volume, "Installation cancelled");
                break;
            }
            counters.archive_unpacked();

            let failed_owners: Vec<&String> = plan
                .depends_on
                .iter()
                .filter(|owner| job.errors.get(owner.as_str()).is_some_and(|e| !e.is_empty()))
                .collect();
            if errors.is_empty() && !failed_owners.is_empty() {
                warn!(volume = %volume, "Holding back volume whose shared files failed to install");
                for owner in failed_owners {
                    errors.push(FileError {
                        path: owner.clone(),
                        reason: format!("shared files are extracted by {}, which failed", owner),
                    });
                }
            }

            if !errors.is_empty() {
                warn!(volume = %volume, errors = errors.len(), "Volume installed with errors");
                report.failed.insert(volume.to_string(), errors.clone());
                job.errors.insert(volume.to_string(), errors);
                continue;
            }

            match self.finalize_volume(plan, &options) {
                Ok(deleted) => {
                    if deleted {
                        report.archives_deleted += 1;
                    }
                    report.installed.push(volume.to_string());
                    job.errors.insert(volume.to_string(), Vec::new());
                }
                Err(e) => {
                    let failure = vec![FileError {
                        path: paths::installed_manifest_path(&plan.root, volume)
                            .display()
                            .to_string(),
                        reason: e.to_string(),
                    }];
                    report.failed.insert(volume.to_string(), failure.clone());
                    job.errors.insert(volume.to_string(), failure);
                }
            }
        }

        report.cancelled = cancel.is_cancelled();
        job.interrupted = report.cancelled;
        job.finished = !report.cancelled;
        report.finished = job.finished;

        let snapshot = counters.snapshot();
        report.files_copied = snapshot.files_copied;
        report.total_files = snapshot.total_files;
        report.bytes_copied = snapshot.bytes_copied;

        info!(
            installed = report.installed.len(),
            failed = report.failed.len(),
            files = report.files_copied,
            total = report.total_files,
            cancelled = report.cancelled,
            "Installation run complete"
        );
        Ok(report)
    }

    /// Record an error-free volume as installed.
    ///
    /// Returns whether the source archive was deleted.
    fn finalize_volume(&self, plan: &VolumePlan, options: &InstallOptions) -> ManagerResult<bool> {
        let volume = plan.volume_name();
        manifest::write_manifest(
            &paths::installed_manifest_path(&plan.root, volume),
            &plan.manifest,
        )?;

        let roots = self.layout.read().all_roots();
        for superseded in &plan.manifest.replace_the_volumes {
            if superseded == volume {
                continue;
            }
            for root in &roots {
                let path = paths::installed_manifest_path(root, superseded);
                if !path.is_file() {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => info!(
                        volume = %volume,
                        superseded = %superseded,
                        root = %root.display(),
                        "Removed superseded volume record"
                    ),
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove superseded manifest"),
                }
            }
        }
        self.registry.invalidate();

        if options.keep_archives {
            return Ok(false);
        }
        match fs::remove_file(&plan.archive) {
            Ok(()) => {
                debug!(archive = %plan.archive.display(), "Deleted installed archive");
                Ok(true)
            }
            Err(e) => {
                warn!(archive = %plan.archive.display(), error = %e, "Failed to delete installed archive");
                Ok(false)
            }
        }
    }
}

/// True if `path` is a regular file of exactly `size` bytes.
fn is_in_place(path: &Path, size: u64) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() == size)
}

fn space_error(path: &Path, source: io::Error) -> ManagerError {
    ManagerError::ReadFailed {
        path: path.to_path_buf(),
        source,
    }
}
