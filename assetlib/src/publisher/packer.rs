//! Size-bounded volume packing.
//!
//! The packer turns a [`LibraryScan`] into volumes:
//!
//! 1. Files already present in an archive of the output directory (per tier)
//!    are skipped, so re-packing only ever adds new, higher-indexed volumes.
//! 2. Remaining files are bucketed by tier, or into a single `Main` bucket
//!    when tiers are ignored.
//! 3. Each bucket is filled in scan order until the estimated compressed size
//!    would exceed the volume limit, then a new volume is opened.
//! 4. Closed volumes are ordered by payload size (largest first) and named
//!    after the highest index already used for their product and tier.
//! 5. Archives are written concurrently, one writer per archive.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::archive::{write_volume_archive, PackedVolume};
use super::estimate::SizeEstimator;
use super::{PublishError, PublishResult};
use crate::config::DEFAULT_MAX_VOLUME_SIZE;
use crate::library::{
    tier_for_variant, volume_index, volume_name, LibraryScan, ScannedFile, MAIN_TIER,
};
use crate::manager::{validate_distinct, ArchiveExtractor, ZipExtractor};
use crate::manifest::{ManifestFile, SizeRegister, VolumeIdentity, VolumeManifest};

/// Upper bound on candidate names tried per volume.
pub const MAX_NAME_PROBES: u32 = 1000;

/// Options for a packing run.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Directory receiving `{volume}.zip` and `{volume}.json`.
    pub dist_dir: PathBuf,
    /// Identity stamped into every manifest.
    pub identity: VolumeIdentity,
    /// Limit on the estimated compressed size of one archive.
    pub max_volume_size: u64,
    /// Collapse all variants into one `Main` bucket.
    pub ignore_tier: bool,
    /// Worker threads for estimation and archive writing (0 = rayon default).
    pub threads: usize,
    /// Volume names every new volume supersedes.
    pub replaces: Vec<String>,
}

impl PackOptions {
    pub fn new(dist_dir: impl Into<PathBuf>, identity: VolumeIdentity) -> Self {
        Self {
            dist_dir: dist_dir.into(),
            identity,
            max_volume_size: DEFAULT_MAX_VOLUME_SIZE,
            ignore_tier: false,
            threads: 0,
            replaces: Vec::new(),
        }
    }

    pub fn with_max_volume_size(mut self, bytes: u64) -> Self {
        self.max_volume_size = bytes;
        self
    }

    pub fn with_ignore_tier(mut self, ignore: bool) -> Self {
        self.ignore_tier = ignore;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_replaces(mut self, replaces: Vec<String>) -> Self {
        self.replaces = replaces;
        self
    }
}

/// Outcome of a packing run.
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    /// Volumes written, in naming order.
    pub volumes: Vec<PackedVolume>,
    /// Files skipped because an existing archive already holds them.
    pub already_archived: usize,
    /// Files whose compressed size had to be computed.
    pub estimated: usize,
}

impl PackReport {
    pub fn total_files(&self) -> u64 {
        self.volumes.iter().map(|v| v.manifest.total_files).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.volumes.iter().map(|v| v.manifest.uncompressed_size).sum()
    }
}

/// Volumes already present in the output directory.
#[derive(Debug, Default)]
struct ExistingVolumes {
    /// `(tier, relative path)` pairs already archived.
    archived: HashSet<(String, String)>,
    /// Relative paths archived in any tier.
    archived_paths: HashSet<String>,
    /// Every volume name in use.
    names: HashSet<String>,
}

impl ExistingVolumes {
    fn load(dist_dir: &Path, extractor: &dyn ArchiveExtractor) -> PublishResult<Self> {
        let mut existing = Self::default();
        for archive in list_with_extension(dist_dir, "zip")? {
            let manifest =
                extractor
                    .read_manifest(&archive)
                    .map_err(|e| PublishError::InvalidArchive {
                        path: archive.clone(),
                        reason: e.to_string(),
                    })?;
            for file in manifest.payload_files() {
                existing
                    .archived
                    .insert((manifest.volume_info.clone(), file.file_path.clone()));
                existing.archived_paths.insert(file.file_path.clone());
            }
            if let Some(stem) = archive.file_stem().and_then(|s| s.to_str()) {
                existing.names.insert(stem.to_string());
            }
            existing.names.insert(manifest.volume_name);
        }
        for sidecar in list_with_extension(dist_dir, "json")? {
            if let Some(stem) = sidecar.file_stem().and_then(|s| s.to_str()) {
                existing.names.insert(stem.to_string());
            }
        }
        debug!(
            dist = %dist_dir.display(),
            volumes = existing.names.len(),
            files = existing.archived.len(),
            "Loaded existing volumes"
        );
        Ok(existing)
    }

    fn contains(&self, tier: &str, relative: &str) -> bool {
        self.archived_paths.contains(relative)
            && self
                .archived
                .contains(&(tier.to_string(), relative.to_string()))
    }

    fn highest_index(&self, product: &str, tier: &str) -> u32 {
        self.names
            .iter()
            .filter_map(|name| volume_index(name, product, tier))
            .max()
            .unwrap_or(0)
    }
}

fn list_with_extension(dir: &Path, extension: &str) -> PublishResult<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        extension
    );
    let entries = glob::glob(&pattern).map_err(|e| PublishError::InvalidPath(e.to_string()))?;
    let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    paths.sort();
    Ok(paths)
}

/// One tier's running bucket.
#[derive(Debug, Default)]
struct TierBucket {
    closed: Vec<Vec<ScannedFile>>,
    current: Vec<ScannedFile>,
    current_size: u64,
    seen: HashSet<String>,
}

impl TierBucket {
    fn push(&mut self, file: ScannedFile, estimate: u64, limit: u64) {
        if !self.current.is_empty() && self.current_size + estimate > limit {
            self.closed.push(std::mem::take(&mut self.current));
            self.current_size = 0;
        }
        self.current_size += estimate;
        self.current.push(file);
    }

    fn finish(mut self) -> Vec<Vec<ScannedFile>> {
        if !self.current.is_empty() {
            self.closed.push(self.current);
        }
        self.closed
    }
}

/// A named volume ready to be written.
#[derive(Debug, Clone)]
pub(super) struct VolumePlan {
    pub manifest: VolumeManifest,
    pub files: Vec<ScannedFile>,
}

/// Packs scanned libraries into size-bounded volumes.
#[derive(Debug, Default)]
pub struct VolumePacker;

impl VolumePacker {
    pub fn new() -> Self {
        Self
    }

    /// Pack a scanned library into new volumes in `options.dist_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any asset unit lacks a separate variant folder
    /// - The output directory is inside the library or an existing archive is unreadable
    /// - A source file cannot be read or an archive cannot be written
    pub fn pack(&self, scan: &LibraryScan, options: &PackOptions) -> PublishResult<PackReport> {
        validate_options(scan, options)?;

        let malformed: Vec<String> = scan.malformed().iter().map(|k| k.to_string()).collect();
        if !malformed.is_empty() {
            return Err(PublishError::MalformedAssets(malformed));
        }

        fs::create_dir_all(&options.dist_dir).map_err(|e| PublishError::CreateDirectoryFailed {
            path: options.dist_dir.clone(),
            source: e,
        })?;

        let pool = build_pool(options.threads)?;
        let existing = ExistingVolumes::load(&options.dist_dir, &ZipExtractor::new())?;

        // Estimate compressed sizes for everything not yet archived.
        let mut register = SizeRegister::load(scan.root());
        let estimator = SizeEstimator::from_register(&register);
        let candidates: Vec<&ScannedFile> = scan
            .files()
            .filter(|f| !existing.archived_paths.contains(&f.relative))
            .collect();
        let estimated = pool.install(|| estimator.estimate_all(candidates))?;
        if estimated > 0 {
            estimator.write_back(&mut register);
            if let Err(e) = register.save() {
                warn!(error = %e, "Failed to persist size register");
            }
        }

        let (buckets, already_archived) = self.bucket(scan, options, &existing, &estimator);
        let plans = self.name_volumes(buckets, options, &existing)?;

        info!(
            volumes = plans.len(),
            skipped = already_archived,
            "Writing volume archives"
        );

        let dist_dir = options.dist_dir.as_path();
        let volumes = pool.install(|| {
            plans
                .par_iter()
                .map(|plan| write_volume_archive(dist_dir, plan))
                .collect::<PublishResult<Vec<_>>>()
        })?;

        for volume in &volumes {
            info!(
                volume = %volume.manifest.volume_name,
                files = volume.manifest.total_files,
                archive_bytes = volume.archive_size,
                "Packed volume"
            );
        }

        Ok(PackReport {
            volumes,
            already_archived,
            estimated,
        })
    }

    /// Fill tier buckets in scan order.
    fn bucket(
        &self,
        scan: &LibraryScan,
        options: &PackOptions,
        existing: &ExistingVolumes,
        estimator: &SizeEstimator,
    ) -> (BTreeMap<String, Vec<Vec<ScannedFile>>>, usize) {
        let mut buckets: BTreeMap<String, TierBucket> = BTreeMap::new();
        let mut skipped: HashSet<(String, String)> = HashSet::new();

        for unit in scan.units() {
            for variant in unit.variants.keys() {
                let tier = if options.ignore_tier {
                    MAIN_TIER.to_string()
                } else {
                    tier_for_variant(variant)
                };

                for file in unit.group_files(variant) {
                    if existing.contains(&tier, &file.relative) {
                        skipped.insert((tier.clone(), file.relative.clone()));
                        continue;
                    }
                    let bucket = buckets.entry(tier.clone()).or_default();
                    if !bucket.seen.insert(file.relative.clone()) {
                        continue;
                    }
                    let estimate = estimator.archived_size(file);
                    bucket.push(file.clone(), estimate, options.max_volume_size);
                }
            }
        }

        let buckets = buckets
            .into_iter()
            .map(|(tier, bucket)| (tier, bucket.finish()))
            .collect();
        (buckets, skipped.len())
    }

    /// Order each tier's volumes by payload size and assign free names.
    fn name_volumes(
        &self,
        buckets: BTreeMap<String, Vec<Vec<ScannedFile>>>,
        options: &PackOptions,
        existing: &ExistingVolumes,
    ) -> PublishResult<Vec<VolumePlan>> {
        let product = options.identity.product.as_str();
        let mut taken: HashSet<String> = HashSet::new();
        let mut plans = Vec::new();

        for (tier, mut volumes) in buckets {
            // Stable sort keeps scan order between equally sized volumes.
            volumes.sort_by_key(|files| std::cmp::Reverse(payload_size(files)));

            let mut next = existing.highest_index(product, &tier) + 1;
            for files in volumes {
                let name = probe_name(product, &tier, &mut next, |candidate| {
                    existing.names.contains(candidate)
                        || taken.contains(candidate)
                        || options.dist_dir.join(format!("{}.zip", candidate)).exists()
                        || options.dist_dir.join(format!("{}.json", candidate)).exists()
                })?;
                taken.insert(name.clone());

                let manifest = VolumeManifest::new(
                    &options.identity,
                    name,
                    tier.clone(),
                    files.iter().map(|f| ManifestFile::new(f.relative.clone(), f.size)),
                    options.replaces.clone(),
                );
                plans.push(VolumePlan { manifest, files });
            }
        }
        Ok(plans)
    }
}

fn payload_size(files: &[ScannedFile]) -> u64 {
    files.iter().map(|f| f.size).sum()
}

/// Find the first free name at or after `*next`, advancing it past the result.
fn probe_name(
    product: &str,
    tier: &str,
    next: &mut u32,
    is_taken: impl Fn(&str) -> bool,
) -> PublishResult<String> {
    for _ in 0..MAX_NAME_PROBES {
        let candidate = volume_name(product, tier, *next);
        *next += 1;
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
        debug!(name = %candidate, "Volume name in use, probing next index");
    }
    Err(PublishError::NameExhausted {
        product: product.to_string(),
        tier: tier.to_string(),
    })
}

fn validate_options(scan: &LibraryScan, options: &PackOptions) -> PublishResult<()> {
    if options.max_volume_size == 0 {
        return Err(PublishError::InvalidOptions(
            "max volume size must be greater than zero".to_string(),
        ));
    }
    if options.identity.product.is_empty() {
        return Err(PublishError::InvalidOptions("product is empty".to_string()));
    }
    validate_distinct(scan.root(), &options.dist_dir)
        .map_err(|e| PublishError::InvalidPath(e.to_string()))
}

fn build_pool(threads: usize) -> PublishResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("assetlib-pack-{}", i))
        .build()
        .map_err(|e| PublishError::InvalidOptions(format!("thread pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LibraryScanner;
    use crate::manifest::LibraryType;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn identity() -> VolumeIdentity {
        VolumeIdentity {
            product: "Studio".to_string(),
            library_name: "Default".to_string(),
            library_type: LibraryType::Default,
            library_version: "1".to_string(),
            volume_version: "1".to_string(),
        }
    }

    fn write(root: &Path, relative: &str, bytes: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_probe_name_skips_taken() {
        let mut next = 1;
        let name = probe_name("P", "4k", &mut next, |c| c == "P_4k_Vol_001").unwrap();
        assert_eq!(name, "P_4k_Vol_002");
        assert_eq!(next, 3);
    }

    #[test]
    fn test_probe_name_is_bounded() {
        let mut next = 1;
        let err = probe_name("P", "4k", &mut next, |_| true).unwrap_err();
        assert!(matches!(err, PublishError::NameExhausted { .. }));
        assert_eq!(next, 1 + MAX_NAME_PROBES);
    }

    #[test]
    fn test_tier_bucket_closes_at_limit() {
        let file = |n: &str| ScannedFile {
            relative: n.to_string(),
            path: PathBuf::from(n),
            size: 10,
        };
        let mut bucket = TierBucket::default();
        bucket.push(file("a"), 60, 100);
        bucket.push(file("b"), 30, 100);
        bucket.push(file("c"), 20, 100);
        bucket.push(file("d"), 500, 100);
        let volumes = bucket.finish();
        assert_eq!(volumes.len(), 3);
        assert_eq!(volumes[0].len(), 2);
        assert_eq!(volumes[1].len(), 1);
        assert_eq!(volumes[2].len(), 1);
    }

    #[test]
    fn test_pack_by_tier() {
        let lib = TempDir::new().unwrap();
        let dist = TempDir::new().unwrap();
        write(lib.path(), "rocks/granite/data/tags.json", b"{}");
        write(lib.path(), "rocks/granite/4k/granite.hdr", &[1u8; 300]);
        write(lib.path(), "rocks/granite/2k/granite.hdr", &[2u8; 200]);
        write(lib.path(), "rocks/granite/high/extra.bin", &[3u8; 10]);

        let scan = LibraryScanner::new().scan(lib.path()).unwrap();
        let report = VolumePacker::new()
            .pack(&scan, &PackOptions::new(dist.path(), identity()))
            .unwrap();

        let names: Vec<&str> = report
            .volumes
            .iter()
            .map(|v| v.manifest.volume_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Studio_2k_Vol_001", "Studio_4k_Vol_001", "Studio_Main_Vol_001"]
        );
        // Data is repeated once per tier.
        for volume in &report.volumes {
            assert!(volume
                .manifest
                .payload_files()
                .any(|f| f.file_path == "rocks/granite/data/tags.json"));
            assert!(volume.archive_path.exists());
            assert!(volume.manifest_path.exists());
        }
        assert!(crate::manifest::paths::size_register_path(lib.path()).exists());
    }

    #[test]
    fn test_pack_ignore_tier_dedups_data() {
        let lib = TempDir::new().unwrap();
        let dist = TempDir::new().unwrap();
        write(lib.path(), "rocks/granite/data/tags.json", b"{}");
        write(lib.path(), "rocks/granite/4k/granite.hdr", &[1u8; 300]);
        write(lib.path(), "rocks/granite/2k/granite.hdr", &[2u8; 200]);

        let scan = LibraryScanner::new().scan(lib.path()).unwrap();
        let options = PackOptions::new(dist.path(), identity()).with_ignore_tier(true);
        let report = VolumePacker::new().pack(&scan, &options).unwrap();

        assert_eq!(report.volumes.len(), 1);
        let manifest = &report.volumes[0].manifest;
        assert_eq!(manifest.volume_name, "Studio_Main_Vol_001");
        assert_eq!(manifest.volume_info, MAIN_TIER);
        assert_eq!(manifest.total_files, 3);
    }

    #[test]
    fn test_pack_rejects_malformed_assets() {
        let lib = TempDir::new().unwrap();
        let dist = TempDir::new().unwrap();
        write(lib.path(), "rocks/lonely/4k/a.bin", b"a");
        write(lib.path(), "rocks/solo/data/b.json", b"b");

        let scan = LibraryScanner::new().scan(lib.path()).unwrap();
        let err = VolumePacker::new()
            .pack(&scan, &PackOptions::new(dist.path(), identity()))
            .unwrap_err();
        match err {
            PublishError::MalformedAssets(assets) => {
                assert_eq!(assets, vec!["rocks/lonely", "rocks/solo"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_pack_rejects_dist_inside_library() {
        let lib = TempDir::new().unwrap();
        write(lib.path(), "rocks/granite/data/tags.json", b"{}");
        write(lib.path(), "rocks/granite/4k/a.bin", b"a");

        let scan = LibraryScanner::new().scan(lib.path()).unwrap();
        let options = PackOptions::new(lib.path().join("dist"), identity());
        assert!(matches!(
            VolumePacker::new().pack(&scan, &options),
            Err(PublishError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_repack_is_additive() {
        let lib = TempDir::new().unwrap();
        let dist = TempDir::new().unwrap();
        write(lib.path(), "rocks/granite/data/tags.json", b"{}");
        write(lib.path(), "rocks/granite/4k/granite.hdr", &[1u8; 300]);

        let packer = VolumePacker::new();
        let options = PackOptions::new(dist.path(), identity());
        let scan = LibraryScanner::new().scan(lib.path()).unwrap();
        let first = packer.pack(&scan, &options).unwrap();
        assert_eq!(first.volumes.len(), 1);

        // Nothing new: nothing written.
        let again = packer.pack(&scan, &options).unwrap();
        assert!(again.volumes.is_empty());
        assert_eq!(again.already_archived, 2);

        // New asset lands in the next index.
        write(lib.path(), "rocks/basalt/data/tags.json", b"{}");
        write(lib.path(), "rocks/basalt/4k/basalt.hdr", &[2u8; 100]);
        let scan = LibraryScanner::new().scan(lib.path()).unwrap();
        let third = packer.pack(&scan, &options).unwrap();
        assert_eq!(third.volumes.len(), 1);
        assert_eq!(third.volumes[0].manifest.volume_name, "Studio_4k_Vol_002");
        assert_eq!(third.volumes[0].manifest.total_files, 2);
    }

    proptest! {
        #[test]
        fn bucket_volumes_stay_within_limit(
            estimates in prop::collection::vec(1u64..5_000, 1..200),
            limit in 1_000u64..20_000,
        ) {
            let mut bucket = TierBucket::default();
            for (i, estimate) in estimates.iter().enumerate() {
                let name = format!("f{}", i);
                let file = ScannedFile { relative: name.clone(), path: PathBuf::from(name), size: 1 };
                bucket.push(file, *estimate, limit);
            }
            let volumes = bucket.finish();

            let mut offset = 0;
            for volume in &volumes {
                let sizes = &estimates[offset..offset + volume.len()];
                let total: u64 = sizes.iter().sum();
                prop_assert!(!volume.is_empty());
                prop_assert!(volume.len() == 1 || total <= limit);
                offset += volume.len();
            }
            prop_assert_eq!(offset, estimates.len());
        }
    }
}
