#![deny(unsafe_code)]
//! Corruption injection for resilience testing.
//!
//! Two layers:
//! - [`strategy`]: pure, seeded algorithms that mutate a byte buffer
//!   (uniform bit-flips, Gaussian-located bit-flips, contiguous scratches).
//! - [`injector`]: maps an image file read-write, applies a strategy over the
//!   whole extent, and flushes the mutation durably.
//!
//! The same `(strategy, parameters, seed, image size)` always reproduces the
//! same mutation sequence.

pub mod injector;
pub mod strategy;

pub use injector::ImageInjector;
pub use strategy::{
    CorruptionOutcome, CorruptionStrategy, Corruptor, DEFAULT_SEED, GaussianBitflip, Scratch,
    StrategyKind, UniformBitflip, derive_seed,
};
