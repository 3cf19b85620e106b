//! Harness configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! none at all) is valid. Command-line flags are applied on top by the binary.

use frs_error::{FrsError, Result};
use frs_inject::{
    CorruptionStrategy, DEFAULT_SEED, GaussianBitflip, Scratch, StrategyKind, UniformBitflip,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the validation program sources.
    pub tests_folder: PathBuf,
    /// Root of the filesystem implementation sources.
    pub root_folder: PathBuf,
    pub image: PathBuf,
    /// Where compiled validation binaries are written.
    pub build_dir: PathBuf,
    /// Formatter tool directory, required for `new_image`.
    pub formatter: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tests_folder: PathBuf::from("test"),
            root_folder: PathBuf::from("."),
            image: PathBuf::from("nifat32.img"),
            build_dir: PathBuf::from("build"),
            formatter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub compiler: String,
    pub flags: Vec<String>,
    /// Validation programs are `<prefix>*.c` in the tests folder.
    pub test_prefix: String,
    /// Paths under the root folder left out of the implementation sources.
    pub exclude: Vec<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: "cc".to_owned(),
            flags: vec!["-O2".to_owned()],
            test_prefix: "test_".to_owned(),
            exclude: vec![PathBuf::from("formatter"), PathBuf::from("unix_nifat32.c")],
        }
    }
}

/// How `I` and `S` scenario steps corrupt the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorruptionConfig {
    /// Bit-flip model for `I` steps: uniform or gaussian.
    pub bitflip: StrategyKind,
    pub mean_ratio: f64,
    pub stddev_ratio: f64,
    pub scratch_width: usize,
    pub scratch_intensity: f64,
    /// Base seed; each step derives its own from this.
    pub seed: u64,
}

impl Default for CorruptionConfig {
    fn default() -> Self {
        let gaussian = GaussianBitflip::default();
        let scratch = Scratch::default();
        Self {
            bitflip: StrategyKind::Uniform,
            mean_ratio: gaussian.mean_ratio,
            stddev_ratio: gaussian.stddev_ratio,
            scratch_width: scratch.width,
            scratch_intensity: scratch.intensity,
            seed: DEFAULT_SEED,
        }
    }
}

impl CorruptionConfig {
    /// Bit-flip strategy flipping `num_flips` bits.
    #[must_use]
    pub fn bitflip_strategy(&self, num_flips: usize, seed: u64) -> CorruptionStrategy {
        match self.bitflip {
            StrategyKind::Gaussian => CorruptionStrategy::Gaussian(GaussianBitflip {
                num_flips,
                mean_ratio: self.mean_ratio,
                stddev_ratio: self.stddev_ratio,
                seed,
            }),
            StrategyKind::Uniform | StrategyKind::Scratch => {
                CorruptionStrategy::Uniform(UniformBitflip { num_flips, seed })
            }
        }
    }

    #[must_use]
    pub fn scratch_strategy(&self, scratch_length: usize, seed: u64) -> CorruptionStrategy {
        CorruptionStrategy::Scratch(Scratch {
            scratch_length,
            width: self.scratch_width,
            intensity: self.scratch_intensity,
            seed,
        })
    }
}

/// Formatter parameters for a freshly built image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub image_size_mb: u64,
    pub sectors_per_cluster: u32,
    pub bootsector_count: u32,
    pub fat_count: u32,
    pub journal_count: u32,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            image_size_mb: 64,
            sectors_per_cluster: 8,
            bootsector_count: 5,
            fat_count: 5,
            journal_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub paths: PathsConfig,
    pub build: BuildConfig,
    pub corruption: CorruptionConfig,
    pub formatter: FormatterConfig,
    pub scenario: Option<PathBuf>,
    /// Build a fresh image with the formatter before the run.
    pub new_image: bool,
    /// Remove build products (and the formatter binary) afterwards.
    pub clean: bool,
    /// NDJSON run log destination.
    pub log_out: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|error| FrsError::InvalidConfig(format!("{}: {error}", path.display())))
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.corruption.bitflip == StrategyKind::Scratch {
            return Err(FrsError::InvalidConfig(
                "bit-flip model must be random or gaussian".to_owned(),
            ));
        }
        if self.build.test_prefix.is_empty() {
            return Err(FrsError::InvalidConfig(
                "test_prefix must not be empty".to_owned(),
            ));
        }
        if self.build.compiler.is_empty() {
            return Err(FrsError::InvalidConfig("compiler must be set".to_owned()));
        }
        if self.new_image && self.paths.formatter.is_none() {
            return Err(FrsError::InvalidConfig(
                "new_image requires a formatter path".to_owned(),
            ));
        }
        // Length-independent strategy checks; scratch length is checked per step.
        self.corruption.bitflip_strategy(0, 0).validate(0)?;
        self.corruption.scratch_strategy(0, 0).validate(0)?;
        Ok(())
    }
}
