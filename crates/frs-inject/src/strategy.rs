//! Seeded corruption strategies.
//!
//! A [`CorruptionStrategy`] is plain configuration. Turning it into a
//! [`Corruptor`] seeds a PRNG owned by that corruptor alone, so two corruptors
//! built from the same strategy produce byte-identical mutations on identical
//! buffers.

use frs_error::{FrsError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 123_456_789;

/// Derive a per-pass seed from a base seed.
///
/// Successive injections into the same image must not reuse a seed, otherwise
/// an identical flip sequence would XOR the previous one back out.
#[must_use]
pub fn derive_seed(base_seed: u64, pass: u64) -> u64 {
    base_seed ^ pass.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

// ── Parameters ──────────────────────────────────────────────────────────────

/// Flip `num_flips` single bits at uniformly random offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformBitflip {
    pub num_flips: usize,
    pub seed: u64,
}

impl Default for UniformBitflip {
    fn default() -> Self {
        Self {
            num_flips: 10,
            seed: DEFAULT_SEED,
        }
    }
}

/// Flip `num_flips` single bits at offsets drawn from a normal distribution.
///
/// The mean and standard deviation are expressed as fractions of the image
/// length so the same parameters scale to any image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBitflip {
    pub num_flips: usize,
    /// Center of the damage, in `[0, 1]` of the image length.
    pub mean_ratio: f64,
    /// Spread of the damage, `>= 0`, as a fraction of the image length.
    pub stddev_ratio: f64,
    pub seed: u64,
}

impl Default for GaussianBitflip {
    fn default() -> Self {
        Self {
            num_flips: 10,
            mean_ratio: 0.5,
            stddev_ratio: 0.15,
            seed: DEFAULT_SEED,
        }
    }
}

/// A contiguous, possibly multi-track, physical scratch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scratch {
    pub scratch_length: usize,
    /// Number of adjacent tracks hit per offset, `>= 1`.
    pub width: usize,
    /// Probability in `[0, 1]` that a byte under the scratch is damaged.
    pub intensity: f64,
    pub seed: u64,
}

impl Default for Scratch {
    fn default() -> Self {
        Self {
            scratch_length: 1024,
            width: 1,
            intensity: 0.7,
            seed: DEFAULT_SEED,
        }
    }
}

// ── Strategy ────────────────────────────────────────────────────────────────

/// Name of a strategy family, as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[serde(alias = "random")]
    Uniform,
    Gaussian,
    Scratch,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => write!(f, "uniform"),
            Self::Gaussian => write!(f, "gaussian"),
            Self::Scratch => write!(f, "scratch"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = FrsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "uniform" => Ok(Self::Uniform),
            "gaussian" | "normal" => Ok(Self::Gaussian),
            "scratch" => Ok(Self::Scratch),
            other => Err(FrsError::InvalidConfig(format!(
                "unknown corruption strategy {other:?} (expected random, gaussian or scratch)"
            ))),
        }
    }
}

/// Closed set of corruption strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorruptionStrategy {
    Uniform(UniformBitflip),
    Gaussian(GaussianBitflip),
    Scratch(Scratch),
}

impl CorruptionStrategy {
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Uniform(_) => StrategyKind::Uniform,
            Self::Gaussian(_) => StrategyKind::Gaussian,
            Self::Scratch(_) => StrategyKind::Scratch,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        match self {
            Self::Uniform(p) => p.seed,
            Self::Gaussian(p) => p.seed,
            Self::Scratch(p) => p.seed,
        }
    }

    /// Same parameters, different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        match &mut self {
            Self::Uniform(p) => p.seed = seed,
            Self::Gaussian(p) => p.seed = seed,
            Self::Scratch(p) => p.seed = seed,
        }
        self
    }

    /// Expected number of damaged locations.
    ///
    /// Exact for bit-flip strategies (collisions aside). For scratches this is
    /// `length * width * intensity`, an expected value and not a count of the
    /// bytes actually changed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn expected_corruption(&self) -> f64 {
        match self {
            Self::Uniform(p) => p.num_flips as f64,
            Self::Gaussian(p) => p.num_flips as f64,
            Self::Scratch(p) => p.scratch_length as f64 * p.width as f64 * p.intensity,
        }
    }

    /// Check every precondition against an image of `len` bytes.
    ///
    /// Runs before any buffer access. A zero-length image is always valid
    /// (every strategy is a no-op on it) once the length-independent
    /// parameters check out.
    pub fn validate(&self, len: usize) -> Result<()> {
        match self {
            Self::Uniform(_) => Ok(()),
            Self::Gaussian(p) => {
                if !p.mean_ratio.is_finite() || !(0.0..=1.0).contains(&p.mean_ratio) {
                    return Err(FrsError::InvalidCorruptionParameters(format!(
                        "mean_ratio must be within [0, 1], got {}",
                        p.mean_ratio
                    )));
                }
                if !p.stddev_ratio.is_finite() || p.stddev_ratio < 0.0 {
                    return Err(FrsError::InvalidCorruptionParameters(format!(
                        "stddev_ratio must be finite and >= 0, got {}",
                        p.stddev_ratio
                    )));
                }
                Ok(())
            }
            Self::Scratch(p) => {
                if p.width == 0 {
                    return Err(FrsError::InvalidCorruptionParameters(
                        "scratch width must be >= 1".to_owned(),
                    ));
                }
                if !p.intensity.is_finite() || !(0.0..=1.0).contains(&p.intensity) {
                    return Err(FrsError::InvalidCorruptionParameters(format!(
                        "scratch intensity must be within [0, 1], got {}",
                        p.intensity
                    )));
                }
                if len > 0 && p.scratch_length > len {
                    return Err(FrsError::InvalidCorruptionParameters(format!(
                        "scratch_length {} exceeds image length {len}",
                        p.scratch_length
                    )));
                }
                Ok(())
            }
        }
    }

    /// Seed a fresh corruptor for this strategy.
    #[must_use]
    pub fn corruptor(&self) -> Corruptor {
        Corruptor::new(*self)
    }
}

impl fmt::Display for CorruptionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(p) => write!(f, "Uniform(flips={}, seed={})", p.num_flips, p.seed),
            Self::Gaussian(p) => write!(
                f,
                "Gaussian(flips={}, mean={}, stddev={}, seed={})",
                p.num_flips, p.mean_ratio, p.stddev_ratio, p.seed
            ),
            Self::Scratch(p) => write!(
                f,
                "Scratch(len={}, width={}, intensity={}, seed={})",
                p.scratch_length, p.width, p.intensity, p.seed
            ),
        }
    }
}

// ── Outcome ─────────────────────────────────────────────────────────────────

/// What a single application actually did to the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionOutcome {
    pub kind: StrategyKind,
    pub image_len: usize,
    /// Number of XOR operations applied. Repeated hits on one byte count once
    /// per hit.
    pub mutations: u64,
    /// Lowest and highest offset touched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
}

impl CorruptionOutcome {
    fn empty(kind: StrategyKind, image_len: usize) -> Self {
        Self {
            kind,
            image_len,
            mutations: 0,
            span: None,
        }
    }

    fn record(&mut self, offset: usize) {
        self.mutations = self.mutations.saturating_add(1);
        self.span = Some(match self.span {
            None => (offset, offset),
            Some((lo, hi)) => (lo.min(offset), hi.max(offset)),
        });
    }
}

// ── Corruptor ───────────────────────────────────────────────────────────────

/// A strategy together with the PRNG it exclusively owns.
#[derive(Debug, Clone)]
pub struct Corruptor {
    strategy: CorruptionStrategy,
    rng: StdRng,
}

impl Corruptor {
    #[must_use]
    pub fn new(strategy: CorruptionStrategy) -> Self {
        Self {
            rng: StdRng::seed_from_u64(strategy.seed()),
            strategy,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> &CorruptionStrategy {
        &self.strategy
    }

    /// Mutate `buf` in place.
    ///
    /// Never reads or writes outside `buf` and never changes its length.
    /// Parameters are validated before the first byte is touched.
    pub fn apply(&mut self, buf: &mut [u8]) -> Result<CorruptionOutcome> {
        let len = buf.len();
        self.strategy.validate(len)?;

        let mut outcome = CorruptionOutcome::empty(self.strategy.kind(), len);
        if len == 0 {
            return Ok(outcome);
        }

        match self.strategy {
            CorruptionStrategy::Uniform(p) => {
                apply_uniform(&p, &mut self.rng, buf, &mut outcome);
            }
            CorruptionStrategy::Gaussian(p) => {
                apply_gaussian(&p, &mut self.rng, buf, &mut outcome);
            }
            CorruptionStrategy::Scratch(p) => {
                apply_scratch(&p, &mut self.rng, buf, &mut outcome);
            }
        }

        Ok(outcome)
    }
}

fn flip_bit(rng: &mut StdRng, buf: &mut [u8], idx: usize, outcome: &mut CorruptionOutcome) {
    let bit = rng.gen_range(0_u8..8);
    buf[idx] ^= 1 << bit;
    outcome.record(idx);
}

fn apply_uniform(
    params: &UniformBitflip,
    rng: &mut StdRng,
    buf: &mut [u8],
    outcome: &mut CorruptionOutcome,
) {
    let len = buf.len();
    for _ in 0..params.num_flips {
        let idx = rng.gen_range(0..len);
        flip_bit(rng, buf, idx, outcome);
    }
}

/// Standard normal sample scaled to `mean`/`stddev` (Box–Muller).
fn sample_normal(rng: &mut StdRng, mean: f64, stddev: f64) -> f64 {
    // u1 in (0, 1] keeps ln() finite.
    let u1 = 1.0 - rng.gen_range(0.0_f64..1.0);
    let u2 = rng.gen_range(0.0_f64..1.0);
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    mean + stddev * z
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn clamp_to_index(sample: f64, len: usize) -> usize {
    let max = (len - 1) as f64;
    sample.round().clamp(0.0, max) as usize
}

#[allow(clippy::cast_precision_loss)]
fn apply_gaussian(
    params: &GaussianBitflip,
    rng: &mut StdRng,
    buf: &mut [u8],
    outcome: &mut CorruptionOutcome,
) {
    let len = buf.len();
    let mean = params.mean_ratio * len as f64;
    let stddev = params.stddev_ratio * len as f64;
    for _ in 0..params.num_flips {
        let idx = clamp_to_index(sample_normal(rng, mean, stddev), len);
        flip_bit(rng, buf, idx, outcome);
    }
}

fn apply_scratch(
    params: &Scratch,
    rng: &mut StdRng,
    buf: &mut [u8],
    outcome: &mut CorruptionOutcome,
) {
    let len = buf.len();
    // validate() guarantees scratch_length <= len.
    let mut start = rng.gen_range(0..=len - params.scratch_length);
    start -= start % params.width;

    for offset in start..start + params.scratch_length {
        for track in 0..params.width {
            let pos = offset + track;
            if pos >= len {
                break;
            }
            if !rng.gen_bool(params.intensity) {
                continue;
            }
            let mask = rng.gen_range(1_u8..=255);
            buf[pos] ^= mask;
            outcome.record(pos);
        }
    }
}
