//! Volume archive writing.
//!
//! Each volume becomes `{volume}.zip` holding the payload at library-relative
//! paths plus the embedded manifest, and a standalone `{volume}.json` copy of
//! the manifest used for catalog generation.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::packer::VolumePlan;
use super::{PublishError, PublishResult};
use crate::manifest::{self, VolumeManifest};

/// Entries at or above this size need ZIP64 headers.
const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// A volume written to disk.
#[derive(Debug, Clone)]
pub struct PackedVolume {
    pub manifest: VolumeManifest,
    pub archive_path: PathBuf,
    pub manifest_path: PathBuf,
    /// Size of the archive file in bytes.
    pub archive_size: u64,
}

/// Archive file name of a volume.
pub fn archive_file_name(volume_name: &str) -> String {
    format!("{}.zip", volume_name)
}

/// Write one volume's archive and standalone manifest into `dist_dir`.
///
/// The archive is written under a temporary name and renamed once complete,
/// so an interrupted run never leaves a truncated `.zip` behind.
pub(super) fn write_volume_archive(dist_dir: &Path, plan: &VolumePlan) -> PublishResult<PackedVolume> {
    let name = &plan.manifest.volume_name;
    let archive_path = dist_dir.join(archive_file_name(name));
    let temp_path = dist_dir.join(format!("{}.zip.tmp", name));

    let result = write_zip(&temp_path, plan);
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    fs::rename(&temp_path, &archive_path).map_err(|e| PublishError::WriteFailed {
        path: archive_path.clone(),
        source: e,
    })?;

    let manifest_path = dist_dir.join(format!("{}.json", name));
    manifest::write_manifest(&manifest_path, &plan.manifest)?;

    let archive_size = fs::metadata(&archive_path)
        .map_err(|e| PublishError::ReadFailed {
            path: archive_path.clone(),
            source: e,
        })?
        .len();

    Ok(PackedVolume {
        manifest: plan.manifest.clone(),
        archive_path,
        manifest_path,
        archive_size,
    })
}

fn write_zip(path: &Path, plan: &VolumePlan) -> PublishResult<()> {
    let file = File::create(path).map_err(|e| PublishError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let zip_err = |e: zip::result::ZipError| {
        PublishError::ArchiveFailed(format!("{}: {}", path.display(), e))
    };

    for source in &plan.files {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(source.size >= LARGE_FILE_THRESHOLD);
        writer
            .start_file(source.relative.as_str(), options)
            .map_err(zip_err)?;

        let input = File::open(&source.path).map_err(|e| PublishError::ReadFailed {
            path: source.path.clone(),
            source: e,
        })?;
        let copied = io::copy(&mut BufReader::new(input), &mut writer).map_err(|e| {
            PublishError::ReadFailed {
                path: source.path.clone(),
                source: e,
            }
        })?;
        if copied != source.size {
            return Err(PublishError::ArchiveFailed(format!(
                "{} changed size during packing ({} bytes scanned, {} read)",
                source.path.display(),
                source.size,
                copied
            )));
        }
    }

    let manifest_json = plan.manifest.to_json()?;
    writer
        .start_file(
            plan.manifest.embedded_entry().as_str(),
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )
        .map_err(zip_err)?;
    io::Write::write_all(&mut writer, manifest_json.as_bytes()).map_err(|e| {
        PublishError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    let mut inner = writer.finish().map_err(zip_err)?;
    io::Write::flush(&mut inner).map_err(|e| PublishError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(
        archive = %path.display(),
        entries = plan.files.len() + 1,
        "Finished archive"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ScannedFile;
    use crate::manifest::{LibraryType, ManifestFile, VolumeIdentity};
    use std::io::Read;
    use tempfile::TempDir;

    fn plan(src: &Path, files: &[(&str, &[u8])]) -> VolumePlan {
        let mut scanned = Vec::new();
        for (relative, bytes) in files {
            let path = src.join(relative.replace('/', "_"));
            fs::write(&path, bytes).unwrap();
            scanned.push(ScannedFile {
                relative: relative.to_string(),
                path,
                size: bytes.len() as u64,
            });
        }
        let identity = VolumeIdentity {
            product: "Studio".to_string(),
            library_name: "Default".to_string(),
            library_type: LibraryType::Default,
            library_version: "1".to_string(),
            volume_version: "1".to_string(),
        };
        let manifest = VolumeManifest::new(
            &identity,
            "Studio_4k_Vol_001",
            "4k",
            scanned.iter().map(|f| ManifestFile::new(f.relative.clone(), f.size)),
            Vec::new(),
        );
        VolumePlan {
            manifest,
            files: scanned,
        }
    }

    #[test]
    fn test_archive_layout() {
        let src = TempDir::new().unwrap();
        let dist = TempDir::new().unwrap();
        let plan = plan(
            src.path(),
            &[
                ("rocks/granite/data/tags.json", b"{\"tags\":[]}".as_slice()),
                ("rocks/granite/4k/granite.hdr", [7u8; 512].as_slice()),
            ],
        );

        let packed = write_volume_archive(dist.path(), &plan).unwrap();
        assert_eq!(packed.archive_path, dist.path().join("Studio_4k_Vol_001.zip"));
        assert!(packed.manifest_path.exists());
        assert!(!dist.path().join("Studio_4k_Vol_001.zip.tmp").exists());

        let mut archive = zip::ZipArchive::new(File::open(&packed.archive_path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "._data/._volumes_installed/Studio_4k_Vol_001.json",
                "rocks/granite/4k/granite.hdr",
                "rocks/granite/data/tags.json",
            ]
        );

        let mut text = String::new();
        archive
            .by_name("._data/._volumes_installed/Studio_4k_Vol_001.json")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        let embedded = VolumeManifest::from_json(&text, "test").unwrap();
        assert_eq!(embedded, plan.manifest);
        assert_eq!(manifest::read_manifest(&packed.manifest_path).unwrap(), plan.manifest);
    }

    #[test]
    fn test_changed_source_fails() {
        let src = TempDir::new().unwrap();
        let dist = TempDir::new().unwrap();
        let mut plan = plan(src.path(), &[("rocks/granite/4k/a.bin", b"abc".as_slice())]);
        plan.files[0].size = 10;

        assert!(matches!(
            write_volume_archive(dist.path(), &plan),
            Err(PublishError::ArchiveFailed(_))
        ));
        assert!(!dist.path().join("Studio_4k_Vol_001.zip").exists());
        assert!(!dist.path().join("Studio_4k_Vol_001.zip.tmp").exists());
    }
}
