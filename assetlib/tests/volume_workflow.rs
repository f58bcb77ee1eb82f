//! Integration tests for the pack → install → uninstall workflow.
//!
//! These tests drive the public API end to end on temporary directories:
//! - Packing a library into tiered, size-bounded volumes
//! - Installing, resuming and re-installing those volumes
//! - Routing expansion volumes and uninstalling with shared data
//!
//! Run with: `cargo test --test volume_workflow`

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};

use rand::RngCore;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use assetlib::library::{tier_for_variant, LibraryScanner};
use assetlib::manager::{
    ArchiveExtractor, FileProgress, InstallOptions, InstalledVolumeRegistry, ManagerConfig,
    ManagerError, ManagerResult, PlannedFile, SpaceProbe, VolumeInstaller, VolumeUninstaller,
    ZipExtractor,
};
use assetlib::manifest::{paths, LibraryType, ManifestFile, VolumeIdentity, VolumeManifest};
use assetlib::publisher::{PackOptions, PackReport, VolumePacker};

// ============================================================================
// Helper Functions
// ============================================================================

const GIB: u64 = 1024 * 1024 * 1024;

/// Space probe reporting a fixed amount of free space on one device.
struct FixedSpace(u64);

impl SpaceProbe for FixedSpace {
    fn available_space(&self, _path: &Path) -> io::Result<u64> {
        Ok(self.0)
    }

    fn device_id(&self, _path: &Path) -> io::Result<u64> {
        Ok(1)
    }
}

/// Extractor that only knows a manifest; used for planning-only tests.
struct ManifestOnly(VolumeManifest);

impl ArchiveExtractor for ManifestOnly {
    fn read_manifest(&self, _archive: &Path) -> ManagerResult<VolumeManifest> {
        Ok(self.0.clone())
    }

    fn extract_files(
        &self,
        _archive: &Path,
        _files: &[PlannedFile],
        _on_file: &mut dyn FnMut(&PlannedFile, ManagerResult<u64>) -> ControlFlow<()>,
    ) -> ManagerResult<()> {
        Ok(())
    }
}

/// Extractor that waits for a signal before extracting.
struct GatedExtractor {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl ArchiveExtractor for GatedExtractor {
    fn read_manifest(&self, archive: &Path) -> ManagerResult<VolumeManifest> {
        ZipExtractor::new().read_manifest(archive)
    }

    fn extract_files(
        &self,
        archive: &Path,
        files: &[PlannedFile],
        on_file: &mut dyn FnMut(&PlannedFile, ManagerResult<u64>) -> ControlFlow<()>,
    ) -> ManagerResult<()> {
        self.started.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        ZipExtractor::new().extract_files(archive, files, on_file)
    }
}

fn identity(library_type: LibraryType, library_name: &str) -> VolumeIdentity {
    VolumeIdentity {
        product: "Studio".to_string(),
        library_name: library_name.to_string(),
        library_type,
        library_version: "2.0".to_string(),
        volume_version: "1".to_string(),
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

fn write_file(root: &Path, relative: &str, contents: &[u8]) {
    let path = paths::resolve(root, relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A small library with two tiers, a non-tier variant and shared data folders.
fn build_library(root: &Path) {
    write_file(root, "rocks/granite/data/tags.json", br#"{"tags":["rock"]}"#);
    write_file(root, "rocks/granite/2k/granite.hdr", &random_bytes(1000));
    write_file(root, "rocks/granite/4k/granite.hdr", &random_bytes(1000));
    write_file(root, "rocks/granite/4k/granite_normal.png", &random_bytes(1000));
    write_file(root, "trees/oak/data/tags.json", br#"{"tags":["tree"]}"#);
    write_file(root, "trees/oak/4k/oak.blend", &random_bytes(1000));
    write_file(root, "trees/oak/preview/oak.png", &random_bytes(500));
}

fn pack(library: &Path, dist: &Path, identity: VolumeIdentity, max: u64) -> PackReport {
    let scan = LibraryScanner::new().scan(library).unwrap();
    VolumePacker::new()
        .pack(&scan, &PackOptions::new(dist, identity).with_max_volume_size(max))
        .unwrap()
}

fn archives(dist: &Path) -> Vec<PathBuf> {
    let mut zips: Vec<PathBuf> = fs::read_dir(dist)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "zip"))
        .collect();
    zips.sort();
    zips
}

fn installer(default_root: &Path) -> VolumeInstaller {
    VolumeInstaller::new(ManagerConfig::new("Studio", default_root))
        .with_space_probe(FixedSpace(u64::MAX))
}

/// Write a single-volume archive by hand.
fn write_archive(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    write_partial_archive(dir, name, files, &[])
}

/// Write an archive whose manifest lists every file but whose zip lacks
/// the `missing` entries.
fn write_partial_archive(
    dir: &Path,
    name: &str,
    files: &[(&str, &[u8])],
    missing: &[&str],
) -> PathBuf {
    let manifest = VolumeManifest::new(
        &identity(LibraryType::Default, "Default"),
        name,
        "4k",
        files
            .iter()
            .map(|(path, data)| ManifestFile::new(*path, data.len() as u64)),
        Vec::new(),
    );
    let path = dir.join(format!("{}.zip", name));
    let mut zip = zip::ZipWriter::new(fs::File::create(&path).unwrap());
    for (entry, data) in files {
        if missing.contains(entry) {
            continue;
        }
        zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.start_file(manifest.embedded_entry(), SimpleFileOptions::default())
        .unwrap();
    zip.write_all(manifest.to_json().unwrap().as_bytes()).unwrap();
    zip.finish().unwrap();
    path
}

fn rock_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("rocks/rock/data/tags.json", b"[1,2,3]".to_vec()),
        ("rocks/rock/4k/rock.hdr", random_bytes(300)),
        ("rocks/rock/4k/rock.blend", random_bytes(200)),
    ]
}

fn as_entries<'a>(files: &'a [(&'static str, Vec<u8>)]) -> Vec<(&'static str, &'a [u8])> {
    files.iter().map(|(p, d)| (*p, d.as_slice())).collect()
}

// ============================================================================
// Packing
// ============================================================================

/// Every (tier, file) pair lands in exactly one volume, within the size limit.
#[test]
fn test_pack_is_bounded_and_lossless() {
    let library = TempDir::new().unwrap();
    let dist = TempDir::new().unwrap();
    build_library(library.path());

    let max = 2500;
    let report = pack(
        library.path(),
        dist.path(),
        identity(LibraryType::Default, "Default"),
        max,
    );
    assert!(report.volumes.len() > 3, "small limit should force several volumes");

    let mut packed: Vec<(String, String)> = Vec::new();
    for volume in &report.volumes {
        let manifest = &volume.manifest;
        assert!(manifest.total_files >= 1);
        if manifest.total_files > 1 {
            assert!(
                manifest.uncompressed_size <= max,
                "{} holds {} bytes",
                manifest.volume_name,
                manifest.uncompressed_size
            );
        }
        for file in manifest.payload_files() {
            packed.push((manifest.volume_info.clone(), file.file_path.clone()));
        }
    }

    let unique: BTreeSet<(String, String)> = packed.iter().cloned().collect();
    assert_eq!(unique.len(), packed.len(), "a file is duplicated within a tier");

    let scan = LibraryScanner::new().scan(library.path()).unwrap();
    let mut expected: BTreeSet<(String, String)> = BTreeSet::new();
    for unit in scan.units() {
        for variant in unit.variants.keys() {
            for file in unit.group_files(variant) {
                expected.insert((tier_for_variant(variant), file.relative.clone()));
            }
        }
    }
    assert_eq!(unique, expected);

    // Shared data is carried by every tier of its asset.
    let tags: Vec<&String> = packed
        .iter()
        .filter(|(_, p)| p == "rocks/granite/data/tags.json")
        .map(|(tier, _)| tier)
        .collect();
    assert_eq!(tags.len(), 2);
}

#[test]
fn test_repack_is_idempotent() {
    let library = TempDir::new().unwrap();
    let dist = TempDir::new().unwrap();
    build_library(library.path());

    let first = pack(
        library.path(),
        dist.path(),
        identity(LibraryType::Default, "Default"),
        2500,
    );
    let second = pack(
        library.path(),
        dist.path(),
        identity(LibraryType::Default, "Default"),
        2500,
    );

    assert!(second.volumes.is_empty());
    assert_eq!(second.already_archived as u64, first.total_files());
    assert_eq!(archives(dist.path()).len(), first.volumes.len());
}

// ============================================================================
// Installation
// ============================================================================

/// Packing then installing reproduces the library byte for byte.
#[test]
fn test_install_reproduces_library() {
    let library = TempDir::new().unwrap();
    let dist = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    build_library(library.path());
    pack(
        library.path(),
        dist.path(),
        identity(LibraryType::Default, "Default"),
        2500,
    );

    let dest = target.path().join("Default");
    let installer = installer(&dest);
    let mut job = installer
        .prepare(&archives(dist.path()), &InstallOptions::default())
        .unwrap();
    let report = installer.run(&mut job, None).unwrap();

    assert!(report.finished);
    assert!(report.failed.is_empty());
    assert_eq!(report.files_copied, report.total_files);
    assert!(archives(dist.path()).is_empty(), "installed archives are deleted");

    let scan = LibraryScanner::new().scan(library.path()).unwrap();
    for file in scan.files() {
        let installed = paths::resolve(&dest, &file.relative);
        assert_eq!(
            fs::read(&installed).unwrap(),
            fs::read(&file.path).unwrap(),
            "{} differs",
            file.relative
        );
    }

    let registry = installer.registry();
    let installed = registry.list_installed(&installer.layout().all_roots(), "Studio");
    assert_eq!(installed.len(), report.installed.len());
}

#[test]
fn test_reinstall_is_idempotent() {
    let library = TempDir::new().unwrap();
    let dist = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    build_library(library.path());
    pack(
        library.path(),
        dist.path(),
        identity(LibraryType::Default, "Default"),
        2500,
    );

    let installer = installer(&target.path().join("Default"));
    let options = InstallOptions::default().with_keep_archives(true);
    let mut job = installer.prepare(&archives(dist.path()), &options).unwrap();
    installer.run(&mut job, None).unwrap();

    let again = installer.prepare(&archives(dist.path()), &options).unwrap();
    assert_eq!(again.files_to_copy(), 0);
    assert_eq!(again.satisfied(), again.counters().total_files());
}

/// Destination already holds `data/tags.json`: two files are planned, one is
/// satisfied and the progress denominator is three.
#[test]
fn test_existing_file_counts_as_satisfied() {
    let temp = TempDir::new().unwrap();
    let files = rock_files();
    let archive = write_archive(temp.path(), "Studio_4k_Vol_001", &as_entries(&files));

    let dest = temp.path().join("Default");
    write_file(&dest, files[0].0, &files[0].1);

    let installer = installer(&dest);
    let job = installer
        .prepare(&[archive], &InstallOptions::default())
        .unwrap();
    assert_eq!(job.files_to_copy(), 2);
    assert_eq!(job.satisfied(), 1);
    assert_eq!(job.counters().total_files(), 3);
    assert_eq!(job.counters().files_copied(), 1);

    // A same-named file of another size is copied again.
    write_file(&dest, files[0].0, b"different");
    let archive = temp.path().join("Studio_4k_Vol_001.zip");
    let job = installer
        .prepare(&[archive], &InstallOptions::default())
        .unwrap();
    assert_eq!(job.files_to_copy(), 3);
}

#[test]
fn test_free_space_shortfall_is_fatal() {
    let temp = TempDir::new().unwrap();
    let manifest = VolumeManifest::new(
        &identity(LibraryType::Default, "Default"),
        "Studio_8k_Vol_001",
        "8k",
        vec![ManifestFile::new("rocks/rock/8k/rock.hdr", 2 * GIB)],
        Vec::new(),
    );

    let installer = VolumeInstaller::new(ManagerConfig::new("Studio", temp.path().join("Default")))
        .with_extractor(ManifestOnly(manifest))
        .with_space_probe(FixedSpace(GIB));

    let err = installer
        .prepare(&[temp.path().join("Studio_8k_Vol_001.zip")], &InstallOptions::default())
        .unwrap_err();
    match &err {
        ManagerError::InsufficientSpace {
            required,
            available,
            ..
        } => {
            assert_eq!(*required, 2 * GIB);
            assert_eq!(*available, GIB);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.to_string().contains("not enough free space"));
    assert!(!temp.path().join("Default").exists(), "nothing is written");
}

/// Cancelling after the first file leaves exactly that file, and the next
/// preparation treats it as already in place.
#[test]
fn test_cancel_after_one_file_then_resume() {
    let temp = TempDir::new().unwrap();
    let files = rock_files();
    let archive = write_archive(temp.path(), "Studio_4k_Vol_001", &as_entries(&files));
    let dest = temp.path().join("Default");
    let installer = installer(&dest);

    let mut job = installer
        .prepare(&[archive.clone()], &InstallOptions::default())
        .unwrap();
    let cancel = job.cancel_flag();
    let on_file = move |_progress: &FileProgress<'_>| cancel.cancel();
    let report = installer.run(&mut job, Some(&on_file)).unwrap();

    assert!(report.cancelled);
    assert!(!report.finished);
    assert!(!job.is_finished());
    let present = files
        .iter()
        .filter(|(rel, _)| paths::resolve(&dest, rel).is_file())
        .count();
    assert_eq!(present, 1);
    assert!(archive.exists());
    assert!(!paths::installed_manifest_path(&dest, "Studio_4k_Vol_001").exists());

    let mut resumed = installer
        .prepare(&[archive.clone()], &InstallOptions::default())
        .unwrap();
    assert_eq!(resumed.satisfied(), 1);
    assert_eq!(resumed.files_to_copy(), 2);

    let report = installer.run(&mut resumed, None).unwrap();
    assert!(report.finished);
    assert_eq!(report.installed, vec!["Studio_4k_Vol_001"]);
    for (rel, data) in &files {
        assert_eq!(&fs::read(paths::resolve(&dest, rel)).unwrap(), data);
    }
}

/// A file missing from one archive fails that volume only: its other files
/// stay, its archive is kept for a retry and later volumes still install.
#[test]
fn test_missing_entry_fails_volume_and_keeps_archive() {
    let temp = TempDir::new().unwrap();
    let broken = write_partial_archive(
        temp.path(),
        "Studio_4k_Vol_001",
        &[
            ("r/a/4k/x", b"xx".as_slice()),
            ("r/a/4k/y", b"yy".as_slice()),
            ("r/a/4k/z", b"zz".as_slice()),
        ],
        &["r/a/4k/y"],
    );
    let good = write_archive(temp.path(), "Studio_4k_Vol_002", &[("r/b/4k/q", b"qq".as_slice())]);
    let dest = temp.path().join("Default");
    let installer = installer(&dest);

    let mut job = installer
        .prepare(&[broken.clone(), good.clone()], &InstallOptions::default())
        .unwrap();
    let report = installer.run(&mut job, None).unwrap();

    assert!(report.finished);
    assert_eq!(report.installed, vec!["Studio_4k_Vol_002"]);
    let errors = &report.failed["Studio_4k_Vol_001"];
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "r/a/4k/y");

    for rel in ["r/a/4k/x", "r/a/4k/z", "r/b/4k/q"] {
        assert!(paths::resolve(&dest, rel).is_file(), "{} should be installed", rel);
    }
    assert!(!paths::resolve(&dest, "r/a/4k/y").exists());
    assert!(broken.exists());
    assert!(!good.exists());
    assert_eq!(report.archives_deleted, 1);
    assert!(!paths::installed_manifest_path(&dest, "Studio_4k_Vol_001").exists());
    assert!(paths::installed_manifest_path(&dest, "Studio_4k_Vol_002").is_file());
}

#[test]
fn test_concurrent_install_is_rejected() {
    let temp = TempDir::new().unwrap();
    let files = rock_files();
    let archive = write_archive(temp.path(), "Studio_4k_Vol_001", &as_entries(&files));

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let installer = installer(&temp.path().join("Default")).with_extractor(GatedExtractor {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    });
    let options = InstallOptions::default().with_keep_archives(true);
    let mut job = installer.prepare(&[archive.clone()], &options).unwrap();

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| installer.run(&mut job, None));
        started_rx.recv().unwrap();

        assert!(installer.is_running());
        assert!(matches!(
            installer.prepare(&[archive.clone()], &options),
            Err(ManagerError::InstallInProgress)
        ));

        release_tx.send(()).unwrap();
        let report = handle.join().unwrap().unwrap();
        assert!(report.finished);
    });
    assert!(!installer.is_running());
}

#[test]
fn test_expansion_volumes_get_their_own_library() {
    let library = TempDir::new().unwrap();
    let dist = TempDir::new().unwrap();
    let libs = TempDir::new().unwrap();
    build_library(library.path());
    pack(
        library.path(),
        dist.path(),
        identity(LibraryType::Expansion, "Rocks & Trees"),
        u64::MAX,
    );

    let default_root = libs.path().join("Default");
    let installer = installer(&default_root);
    let mut job = installer
        .prepare(&archives(dist.path()), &InstallOptions::default())
        .unwrap();
    let expansion = libs.path().join("Rocks & Trees");
    assert_eq!(job.new_roots(), &[expansion.clone()]);

    let report = installer.run(&mut job, None).unwrap();
    assert!(report.finished);
    assert!(expansion.join("trees/oak/4k/oak.blend").is_file());
    assert!(!default_root.join("trees").exists());

    let layout = installer.layout();
    assert_eq!(layout.expansion_roots, vec![expansion.clone()]);
    let installed = installer
        .registry()
        .list_installed(&layout.all_roots(), "Studio");
    assert_eq!(installed.len(), report.installed.len());
}

// ============================================================================
// Uninstallation
// ============================================================================

#[test]
fn test_uninstall_keeps_data_shared_with_other_tier() {
    let library = TempDir::new().unwrap();
    let dist = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    build_library(library.path());
    pack(
        library.path(),
        dist.path(),
        identity(LibraryType::Default, "Default"),
        u64::MAX,
    );

    let dest = target.path().join("Default");
    let registry = Arc::new(InstalledVolumeRegistry::new());
    let installer = installer(&dest).with_registry(Arc::clone(&registry));
    let mut job = installer
        .prepare(&archives(dist.path()), &InstallOptions::default())
        .unwrap();
    installer.run(&mut job, None).unwrap();

    let roots = vec![dest.clone()];
    let before: HashSet<String> = registry
        .list_installed(&roots, "Studio")
        .into_iter()
        .collect();
    assert!(before.contains("Studio_4k_Vol_001"));
    assert!(before.contains("Studio_2k_Vol_001"));

    let uninstaller = VolumeUninstaller::new(Arc::clone(&registry));
    let report = uninstaller.uninstall(&dest, "Studio_4k_Vol_001").unwrap();
    assert!(report.files_kept >= 1);
    assert!(!dest.join("rocks/granite/4k").exists());
    assert!(!dest.join("trees/oak/4k").exists());
    assert!(dest.join("rocks/granite/data/tags.json").is_file());
    assert!(dest.join("rocks/granite/2k/granite.hdr").is_file());
    assert!(
        dest.join("trees/oak/data/tags.json").is_file(),
        "oak data is still listed by the Main volume"
    );

    let after = registry.list_installed(&roots, "Studio");
    assert!(!after.contains(&"Studio_4k_Vol_001".to_string()));

    uninstaller.uninstall(&dest, "Studio_2k_Vol_001").unwrap();
    assert!(!dest.join("rocks").exists());
    uninstaller.uninstall(&dest, "Studio_Main_Vol_001").unwrap();
    assert!(!dest.join("trees").exists());
    assert!(registry.list_installed(&roots, "Studio").is_empty());
}
