#![forbid(unsafe_code)]
//! Scenario-driven resilience runs.
//!
//! A run builds the validation programs, then walks a [`Scenario`] of test,
//! bit-flip and scratch steps over one persistent image, recompiling the
//! programs in no-creation mode after the first passing test step. The
//! result is a [`RunReport`] plus a structured [`RunLog`].

pub mod config;
pub mod image;
pub mod log;
pub mod orchestrator;
pub mod runner;
pub mod scenario;
pub mod toolchain;
pub mod tracing_setup;

pub use config::{BuildConfig, CorruptionConfig, FormatterConfig, HarnessConfig, PathsConfig};
pub use image::FormatterImage;
pub use log::{EntryStatus, RunLog, StepLogEntry};
pub use orchestrator::{
    BuildMode, Orchestrator, RunFailure, RunPhase, RunReport, StepOutcome, StepRecord,
    ValidationBinary, ValidationBuilder, ValidationProgram, ValidationRunner,
};
pub use runner::ProcessRunner;
pub use scenario::{Scenario, ScenarioStep, StepKind};
pub use toolchain::{CcBuilder, collect_sources, discover_programs};
