#![forbid(unsafe_code)]
//! Error types for the resilience harness.
//!
//! # Error Taxonomy
//!
//! | Class | Variant | Fatal | Effect on a run |
//! |-------|---------|-------|-----------------|
//! | Build | `Build` | yes | aborts before any testing (or during recompilation) |
//! | Test | `TestFailure` | yes | aborts the remaining scenario, report still produced |
//! | Injection I/O | `InjectionIo` | no | logged, next step runs |
//! | Scenario | `ScenarioParse` | no | built-in fallback scenario is used |
//! | Parameters | `InvalidCorruptionParameters` | yes | rejected before any buffer access |
//! | Config | `InvalidConfig` | yes | rejected before the run starts |
//! | Namespace | `Namespace` | yes | population/clearing action failed |
//! | OS | `Io` | yes | generic I/O outside the image path |
//!
//! ## Exit codes
//!
//! Every variant maps to exactly one process exit code via
//! [`FrsError::exit_code`]. The mapping is exhaustive (no wildcard arms) so a
//! new variant does not compile until its code is assigned.
//!
//! | Variant | Code |
//! |---------|------|
//! | `TestFailure` | 1 |
//! | `Build` | 2 |
//! | `InvalidCorruptionParameters` | 3 |
//! | `InvalidConfig` | 4 |
//! | `ScenarioParse` | 5 |
//! | `InjectionIo` | 6 |
//! | `Namespace` | 7 |
//! | `Io` | 8 |

use thiserror::Error;

/// Unified error type for harness operations.
#[derive(Debug, Error)]
pub enum FrsError {
    /// Operating system I/O error outside the injection path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A validation program could not be compiled.
    #[error("build failed for {program}: {detail}")]
    Build { program: String, detail: String },

    /// A validation binary exited non-zero (or could not be executed).
    #[error("validation binary {binary} failed with exit code {exit_code} (workload {workload})")]
    TestFailure {
        binary: String,
        exit_code: i32,
        workload: u64,
    },

    /// The image could not be opened, mapped, or flushed.
    #[error("injection I/O error on {path}: {source}")]
    InjectionIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A scenario source was unreadable or produced no usable steps.
    #[error("scenario parse error: {0}")]
    ScenarioParse(String),

    /// Corruption parameters violate a precondition (e.g. scratch longer
    /// than the image).
    #[error("invalid corruption parameters: {0}")]
    InvalidCorruptionParameters(String),

    /// Harness configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The filesystem under test rejected a namespace operation.
    #[error("namespace action failed: {0}")]
    Namespace(String),
}

impl FrsError {
    /// Whether this error terminates an orchestrator run.
    ///
    /// `InjectionIo` and `ScenarioParse` are recorded and execution proceeds.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InjectionIo { .. } | Self::ScenarioParse(_) => false,
            Self::Io(_)
            | Self::Build { .. }
            | Self::TestFailure { .. }
            | Self::InvalidCorruptionParameters(_)
            | Self::InvalidConfig(_)
            | Self::Namespace(_) => true,
        }
    }

    /// Process exit code reported by the harness binary for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::TestFailure { .. } => 1,
            Self::Build { .. } => 2,
            Self::InvalidCorruptionParameters(_) => 3,
            Self::InvalidConfig(_) => 4,
            Self::ScenarioParse(_) => 5,
            Self::InjectionIo { .. } => 6,
            Self::Namespace(_) => 7,
            Self::Io(_) => 8,
        }
    }

    /// Short machine-readable class name, used in structured run logs.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Build { .. } => "build",
            Self::TestFailure { .. } => "test_failure",
            Self::InjectionIo { .. } => "injection_io",
            Self::ScenarioParse(_) => "scenario_parse",
            Self::InvalidCorruptionParameters(_) => "invalid_corruption_parameters",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Namespace(_) => "namespace",
        }
    }
}

/// Result alias using `FrsError`.
pub type Result<T> = std::result::Result<T, FrsError>;
