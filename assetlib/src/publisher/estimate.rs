//! Compressed-size estimation.
//!
//! Each file is deflated once into a counting sink; results are cached by
//! library-relative path and persisted in the source root's size register.

use std::fs::File;
use std::io::{self, BufReader, Write};

use dashmap::DashMap;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use rayon::prelude::*;
use tracing::debug;

use super::{PublishError, PublishResult};
use crate::library::ScannedFile;
use crate::manifest::SizeRegister;

/// Per-entry bytes a ZIP container adds on top of the compressed data
/// (local header, central directory record and data descriptor).
const ENTRY_OVERHEAD: u64 = 30 + 46 + 24;

/// Writer that only counts bytes.
#[derive(Debug, Default)]
struct CountingSink {
    count: u64,
}

impl Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Deflated size of a file's contents.
pub fn compressed_size(file: &ScannedFile) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(&file.path)?);
    let mut encoder = DeflateEncoder::new(CountingSink::default(), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    Ok(encoder.finish()?.count)
}

/// Concurrent cache of compressed-size estimates.
#[derive(Debug, Default)]
pub struct SizeEstimator {
    cache: DashMap<String, u64>,
}

impl SizeEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from a persisted register.
    pub fn from_register(register: &SizeRegister) -> Self {
        let cache = DashMap::with_capacity(register.len());
        for (path, size) in register.entries() {
            cache.insert(path.clone(), *size);
        }
        Self { cache }
    }

    /// Estimate every file not yet cached, in parallel.
    ///
    /// Returns the number of files that had to be compressed.
    pub fn estimate_all<'a, I>(&self, files: I) -> PublishResult<usize>
    where
        I: IntoIterator<Item = &'a ScannedFile>,
    {
        let missing: Vec<&ScannedFile> = files
            .into_iter()
            .filter(|f| !self.cache.contains_key(&f.relative))
            .collect();

        missing.par_iter().try_for_each(|file| {
            let size = compressed_size(file).map_err(|e| PublishError::ReadFailed {
                path: file.path.clone(),
                source: e,
            })?;
            self.cache.insert(file.relative.clone(), size);
            Ok::<(), PublishError>(())
        })?;

        debug!(computed = missing.len(), cached = self.cache.len(), "Estimated compressed sizes");
        Ok(missing.len())
    }

    /// Estimated bytes a file occupies inside an archive.
    ///
    /// Falls back to the uncompressed size for files never estimated.
    pub fn archived_size(&self, file: &ScannedFile) -> u64 {
        let data = self
            .cache
            .get(&file.relative)
            .map(|entry| *entry.value())
            .unwrap_or(file.size);
        data + ENTRY_OVERHEAD + 2 * file.relative.len() as u64
    }

    pub fn get(&self, relative: &str) -> Option<u64> {
        self.cache.get(relative).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Copy every cached estimate into a register.
    pub fn write_back(&self, register: &mut SizeRegister) {
        for entry in self.cache.iter() {
            register.insert(entry.key().clone(), *entry.value());
        }
    }
}
