//! Randomized namespace population.
//!
//! Count resolution:
//! 1. Only `summary` set: `dirs ~ U[0, summary]`, `files = summary - dirs`.
//! 2. `summary` plus one of `files`/`dirs`: the unset one takes the remainder.
//! 3. Nothing to create: no-op.
//!
//! Depth bounds are only checked once at least one directory chain is
//! requested, so a zero-count pass never fails on them.
//!
//! Depth per directory chain:
//!
//! | `min_depth` | `max_depth` | depth |
//! |-------------|-------------|-------|
//! | unset | unset | `U[1, 5]` |
//! | set | set | `U[min, max]` |
//! | set | unset | `U[min, min + 2]` |
//! | unset | set | `U[1, max]` |
//!
//! Depths below 1 are rejected.
//!
//! Each directory is a chain of `depth` nested levels starting at the root;
//! every level is recorded so intermediate directories can parent files.

use crate::action::{ActionReport, FsAction};
use crate::api::{FsApi, ROOT_DIR, join_path};
use frs_error::{FrsError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::{debug, info};

const DEFAULT_FILL_SEED: u64 = 0x5EED_F111;

/// Recognized population options. `None` means "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    pub files: Option<usize>,
    pub dirs: Option<usize>,
    pub summary: Option<usize>,
    pub min_depth: Option<usize>,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            files: None,
            dirs: None,
            summary: None,
            min_depth: None,
            max_depth: None,
            seed: DEFAULT_FILL_SEED,
        }
    }
}

impl FillOptions {
    /// Options that only set a combined entry count.
    #[must_use]
    pub fn summary(summary: usize, seed: u64) -> Self {
        Self {
            summary: Some(summary),
            seed,
            ..Self::default()
        }
    }

    fn resolve_counts(&self, rng: &mut StdRng) -> (usize, usize) {
        match (self.dirs, self.files, self.summary) {
            (None, None, Some(summary)) => {
                let dirs = rng.gen_range(0..=summary);
                (dirs, summary - dirs)
            }
            (Some(dirs), None, Some(summary)) => (dirs, summary.saturating_sub(dirs)),
            (None, Some(files), Some(summary)) => (summary.saturating_sub(files), files),
            (dirs, files, _) => (dirs.unwrap_or(0), files.unwrap_or(0)),
        }
    }

    fn depth_range(&self) -> Result<RangeInclusive<usize>> {
        match (self.min_depth, self.max_depth) {
            (Some(0), _) => Err(FrsError::InvalidConfig("min_depth must be >= 1".to_owned())),
            (None, None) => Ok(1..=5),
            (Some(min), Some(max)) if min <= max => Ok(min..=max),
            (Some(min), Some(max)) => Err(FrsError::InvalidConfig(format!(
                "min_depth {min} exceeds max_depth {max}"
            ))),
            (Some(min), None) => Ok(min..=min.saturating_add(2)),
            (None, Some(0)) => Err(FrsError::InvalidConfig(
                "max_depth must be >= 1 when min_depth is unset".to_owned(),
            )),
            (None, Some(max)) => Ok(1..=max),
        }
    }
}

/// What a population pass created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    /// Resolved number of directory chains.
    pub dirs: usize,
    /// Resolved number of files.
    pub files: usize,
    /// Depth chosen for each chain, in creation order.
    pub depths: Vec<usize>,
    /// Every directory created, intermediate levels included.
    pub tree: Vec<String>,
    pub created_files: Vec<String>,
}

impl FillReport {
    /// Directory chains plus files.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.dirs + self.files
    }
}

#[derive(Debug, Clone, Default)]
pub struct FillFileSystem {
    options: FillOptions,
}

impl FillFileSystem {
    #[must_use]
    pub fn new(options: FillOptions) -> Self {
        Self { options }
    }

    /// Populate `fs` and report what was created.
    pub fn fill(&self, fs: &mut dyn FsApi) -> Result<FillReport> {
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let (dirs, files) = self.options.resolve_counts(&mut rng);

        let mut report = FillReport {
            dirs,
            files,
            ..FillReport::default()
        };
        if dirs == 0 && files == 0 {
            debug!("nothing to populate");
            return Ok(report);
        }
        let depth_range = if dirs > 0 {
            self.options.depth_range()?
        } else {
            1..=1
        };

        for _ in 0..dirs {
            let depth = rng.gen_range(depth_range.clone());
            let mut parent = ROOT_DIR.to_owned();
            for _ in 0..depth {
                let name = fs.make_random_dir(&parent)?;
                parent = join_path(&parent, &name);
                report.tree.push(parent.clone());
            }
            report.depths.push(depth);
        }

        for _ in 0..files {
            let parent = if report.tree.is_empty() {
                ROOT_DIR.to_owned()
            } else {
                report.tree[rng.gen_range(0..report.tree.len())].clone()
            };
            let name = fs.make_random_file(&parent)?;
            report.created_files.push(join_path(&parent, &name));
        }

        info!(
            dirs,
            files,
            directories_created = report.tree.len(),
            "namespace populated"
        );
        Ok(report)
    }
}

impl FsAction for FillFileSystem {
    fn name(&self) -> &'static str {
        "fill_file_system"
    }

    fn action(&self, fs: &mut dyn FsApi) -> Result<ActionReport> {
        self.fill(fs).map(ActionReport::Fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::path_depth;
    use crate::memfs::MemFs;

    #[test]
    fn summary_only_splits_between_dirs_and_files() {
        let mut fs = MemFs::new(1);
        let report = FillFileSystem::new(FillOptions::summary(20, 4))
            .fill(&mut fs)
            .unwrap();
        assert_eq!(report.entries(), 20);
        assert_eq!(report.created_files.len(), report.files);
        assert_eq!(report.depths.len(), report.dirs);
    }

    #[test]
    fn explicit_counts_are_honoured() {
        let mut fs = MemFs::new(1);
        let options = FillOptions {
            files: Some(7),
            dirs: Some(3),
            min_depth: Some(2),
            max_depth: Some(2),
            ..FillOptions::default()
        };
        let report = FillFileSystem::new(options).fill(&mut fs).unwrap();
        assert_eq!(report.tree.len(), 6);
        assert_eq!(fs.files().count(), 7);
        assert_eq!(fs.directories().count(), 6);
    }

    #[test]
    fn summary_with_one_count_takes_the_remainder() {
        let mut rng = StdRng::seed_from_u64(0);
        let options = FillOptions {
            dirs: Some(4),
            summary: Some(10),
            ..FillOptions::default()
        };
        assert_eq!(options.resolve_counts(&mut rng), (4, 6));
        let options = FillOptions {
            files: Some(12),
            summary: Some(10),
            ..FillOptions::default()
        };
        assert_eq!(options.resolve_counts(&mut rng), (0, 12));
    }

    #[test]
    fn nothing_set_is_a_noop() {
        let mut fs = MemFs::new(1);
        let report = FillFileSystem::default().fill(&mut fs).unwrap();
        assert_eq!(report, FillReport::default());
        assert_eq!(fs.entry_count(), 0);
    }

    #[test]
    fn files_without_dirs_land_in_root() {
        let mut fs = MemFs::new(1);
        let options = FillOptions {
            files: Some(5),
            dirs: Some(0),
            ..FillOptions::default()
        };
        let report = FillFileSystem::new(options).fill(&mut fs).unwrap();
        assert!(report.created_files.iter().all(|f| path_depth(f) == 1));
    }

    #[test]
    fn depth_policy_table() {
        let cases = [
            ((None, None), Some(1..=5)),
            ((Some(2), Some(4)), Some(2..=4)),
            ((Some(3), None), Some(3..=5)),
            ((None, Some(6)), Some(1..=6)),
            ((Some(5), Some(2)), None),
            ((None, Some(0)), None),
            ((Some(0), Some(3)), None),
        ];
        for ((min_depth, max_depth), expected) in cases {
            let options = FillOptions {
                min_depth,
                max_depth,
                ..FillOptions::default()
            };
            assert_eq!(
                options.depth_range().ok(),
                expected,
                "{min_depth:?}/{max_depth:?}"
            );
        }
    }

    #[test]
    fn invalid_depths_fail_before_touching_the_namespace() {
        let mut fs = MemFs::new(1);
        let options = FillOptions {
            dirs: Some(3),
            files: Some(2),
            min_depth: Some(4),
            max_depth: Some(1),
            ..FillOptions::default()
        };
        assert!(FillFileSystem::new(options).fill(&mut fs).is_err());
        assert_eq!(fs.entry_count(), 0);
    }

    #[test]
    fn depth_bounds_are_ignored_without_directories() {
        let mut fs = MemFs::new(1);
        let empty = FillOptions {
            files: Some(0),
            dirs: Some(0),
            min_depth: Some(4),
            max_depth: Some(1),
            ..FillOptions::default()
        };
        let report = FillFileSystem::new(empty).fill(&mut fs).unwrap();
        assert_eq!(report, FillReport::default());
        assert_eq!(fs.entry_count(), 0);

        let files_only = FillOptions {
            files: Some(2),
            min_depth: Some(0),
            ..FillOptions::default()
        };
        let report = FillFileSystem::new(files_only).fill(&mut fs).unwrap();
        assert_eq!(report.created_files.len(), 2);
        assert!(report.tree.is_empty());
    }

    #[test]
    fn same_seed_same_shape() {
        let options = FillOptions::summary(30, 77);
        let a = FillFileSystem::new(options.clone())
            .fill(&mut MemFs::new(5))
            .unwrap();
        let b = FillFileSystem::new(options)
            .fill(&mut MemFs::new(5))
            .unwrap();
        assert_eq!(a, b);
    }
}
