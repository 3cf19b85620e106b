//! Durable in-place corruption of an image file.
//!
//! The image is mapped read-write for the duration of one [`ImageInjector::inject`]
//! call. The mapping lives in a scope guard, so it is flushed and released on
//! every exit path, including a panicking strategy.
//!
//! # Caller obligation
//!
//! Nothing else may read or write the image while an injection is in
//! progress. Concurrent external access to the same path is undefined
//! behaviour for the mapping and is not detected here.

use crate::strategy::{CorruptionOutcome, CorruptionStrategy, Corruptor, derive_seed};
use frs_error::{FrsError, Result};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Applies corruption strategies to one image path.
#[derive(Debug, Clone)]
pub struct ImageInjector {
    path: PathBuf,
}

impl ImageInjector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `strategy` once with a freshly seeded corruptor.
    pub fn inject(&self, strategy: &CorruptionStrategy) -> Result<CorruptionOutcome> {
        self.inject_with(&mut strategy.corruptor())
    }

    /// Apply `strategy` `count` times, reseeding each pass from the
    /// strategy's seed so passes do not cancel each other out.
    pub fn inject_repeated(
        &self,
        strategy: &CorruptionStrategy,
        count: u64,
    ) -> Result<Vec<CorruptionOutcome>> {
        let mut outcomes = Vec::new();
        let mut total = 0_f64;
        for pass in 0..count {
            let reseeded = strategy.with_seed(derive_seed(strategy.seed(), pass));
            let outcome = self.inject(&reseeded)?;
            total += reseeded.expected_corruption();
            info!(
                image = %self.path.display(),
                pass,
                mutations = outcome.mutations,
                total_corruption = total,
                "injection pass complete"
            );
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Apply an existing corruptor, continuing its PRNG stream.
    pub fn inject_with(&self, corruptor: &mut Corruptor) -> Result<CorruptionOutcome> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        let len = file
            .metadata()
            .map_err(|source| self.io_error(source))?
            .len();
        let len = usize::try_from(len).map_err(|_| {
            FrsError::InvalidCorruptionParameters(format!(
                "image {} is too large to map ({len} bytes)",
                self.path.display()
            ))
        })?;

        corruptor.strategy().validate(len)?;

        if len == 0 {
            debug!(image = %self.path.display(), "empty image, nothing to corrupt");
            return corruptor.apply(&mut []);
        }

        let mut mapped = MappedImage::map(&file, &self.path)?;
        let outcome = corruptor.apply(mapped.bytes_mut())?;
        mapped.flush()?;

        debug!(
            image = %self.path.display(),
            strategy = %corruptor.strategy(),
            mutations = outcome.mutations,
            "image corrupted"
        );
        Ok(outcome)
    }

    fn io_error(&self, source: std::io::Error) -> FrsError {
        FrsError::InjectionIo {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Read-write mapping of a whole image, flushed on drop if not flushed
/// explicitly.
struct MappedImage<'a> {
    map: MmapMut,
    path: &'a Path,
    flushed: bool,
}

impl<'a> MappedImage<'a> {
    #[allow(unsafe_code)]
    fn map(file: &File, path: &'a Path) -> Result<Self> {
        // SAFETY: the caller holds the image exclusively for the duration of
        // the injection (see module docs); the file is not truncated while the
        // map is alive because we hold the only handle we opened.
        let map = unsafe { MmapMut::map_mut(file) }.map_err(|source| FrsError::InjectionIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            map,
            path,
            flushed: false,
        })
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.flushed = false;
        &mut self.map[..]
    }

    fn flush(&mut self) -> Result<()> {
        self.map.flush().map_err(|source| FrsError::InjectionIo {
            path: self.path.display().to_string(),
            source,
        })?;
        self.flushed = true;
        Ok(())
    }
}

impl Drop for MappedImage<'_> {
    fn drop(&mut self) {
        if !self.flushed {
            if let Err(error) = self.map.flush() {
                warn!(image = %self.path.display(), %error, "flush on release failed");
            }
        }
    }
}
