//! Resilience orchestrator.
//!
//! `Building → Testing → (Recompiling) → {Testing | Injecting | Scratching}* → Done | Failed`
//!
//! - Every validation program is built before the first step; a build
//!   failure ends the run.
//! - A `T` step runs every binary with the step magnitude as workload. The
//!   first non-zero exit ends the run (later binaries and steps are not run).
//! - After the first successful `T` step, and only then, all programs are
//!   rebuilt in no-creation mode and replace the current binaries.
//! - `I` and `S` steps corrupt the image. Injection I/O errors are recorded
//!   and the run moves on; invalid corruption parameters end the run.
//!
//! Steps run strictly in script order on the calling thread.

use crate::config::CorruptionConfig;
use crate::log::{RunLog, StepLogEntry};
use crate::scenario::{Scenario, ScenarioStep, StepKind};
use frs_error::{FrsError, Result};
use frs_inject::{CorruptionStrategy, ImageInjector, derive_seed};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

// ── Collaborators ───────────────────────────────────────────────────────────

/// Whether validation binaries may perform destructive namespace setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Creation,
    /// Setup is compiled out; the namespace already holds entries.
    NoCreation,
}

impl BuildMode {
    #[must_use]
    pub fn allows_creation(self) -> bool {
        matches!(self, Self::Creation)
    }
}

/// A validation program source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProgram {
    pub name: String,
    pub source: PathBuf,
}

/// A runnable validation binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationBinary {
    pub name: String,
    pub path: PathBuf,
    pub mode: BuildMode,
}

/// Build service: source plus mode in, runnable binary out.
pub trait ValidationBuilder {
    fn build(&mut self, program: &ValidationProgram, mode: BuildMode) -> Result<ValidationBinary>;
}

/// Runs a binary with a workload size and returns its exit code.
pub trait ValidationRunner {
    fn run(&mut self, binary: &ValidationBinary, workload: u64) -> Result<i32>;
}

impl<T: ValidationBuilder + ?Sized> ValidationBuilder for &mut T {
    fn build(&mut self, program: &ValidationProgram, mode: BuildMode) -> Result<ValidationBinary> {
        (**self).build(program, mode)
    }
}

impl<T: ValidationRunner + ?Sized> ValidationRunner for &mut T {
    fn run(&mut self, binary: &ValidationBinary, workload: u64) -> Result<i32> {
        (**self).run(binary, workload)
    }
}

// ── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Building,
    Testing,
    Recompiling,
    Injecting,
    Scratching,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Every validation binary exited 0.
    Passed,
    /// Corruption was written to the image.
    Applied,
    /// Non-fatal error; the run continued.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub kind: StepKind,
    pub magnitude: u64,
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutations: Option<u64>,
    /// Running corruption counter after this step.
    pub corruption_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub class: String,
    pub exit_code: i32,
    pub message: String,
}

impl From<&FrsError> for RunFailure {
    fn from(error: &FrsError) -> Self {
        Self {
            class: error.class().to_owned(),
            exit_code: error.exit_code(),
            message: error.to_string(),
        }
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub passed: bool,
    /// Scratch steps contribute an expected value, so this is an estimate.
    pub corruption_total: f64,
    pub steps_executed: usize,
    pub recompiled: bool,
    pub final_phase: RunPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Process exit status for this report.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match &self.failure {
            None => 0,
            Some(failure) => failure.exit_code,
        }
    }
}

// ── Orchestrator ────────────────────────────────────────────────────────────

struct RunState {
    phase: RunPhase,
    binaries: Vec<ValidationBinary>,
    recompiled: bool,
    corruption_total: f64,
    steps_executed: usize,
    steps: Vec<StepRecord>,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: RunPhase::Building,
            binaries: Vec::new(),
            recompiled: false,
            corruption_total: 0.0,
            steps_executed: 0,
            steps: Vec::new(),
        }
    }

    fn record(
        &mut self,
        index: usize,
        step: ScenarioStep,
        outcome: StepOutcome,
    ) -> &mut StepRecord {
        self.steps.push(StepRecord {
            index,
            kind: step.kind,
            magnitude: step.magnitude,
            outcome,
            mutations: None,
            corruption_total: self.corruption_total,
            error: None,
        });
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    fn into_report(self, failure: Option<&FrsError>) -> RunReport {
        RunReport {
            passed: failure.is_none(),
            corruption_total: self.corruption_total,
            steps_executed: self.steps_executed,
            recompiled: self.recompiled,
            final_phase: if failure.is_some() {
                RunPhase::Failed
            } else {
                RunPhase::Done
            },
            failure: failure.map(RunFailure::from),
            steps: self.steps,
        }
    }
}

pub struct Orchestrator<B, R> {
    builder: B,
    runner: R,
    programs: Vec<ValidationProgram>,
    injector: ImageInjector,
    corruption: CorruptionConfig,
    run_name: String,
    log: RunLog,
}

impl<B: ValidationBuilder, R: ValidationRunner> Orchestrator<B, R> {
    pub fn new(
        builder: B,
        runner: R,
        programs: Vec<ValidationProgram>,
        image: impl Into<PathBuf>,
        corruption: CorruptionConfig,
    ) -> Self {
        Self {
            builder,
            runner,
            programs,
            injector: ImageInjector::new(image),
            corruption,
            run_name: "resilience".to_owned(),
            log: RunLog::new(),
        }
    }

    #[must_use]
    pub fn with_run_name(mut self, name: &str) -> Self {
        name.clone_into(&mut self.run_name);
        self
    }

    #[must_use]
    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Execute `scenario` to a terminal state.
    pub fn run(&mut self, scenario: &Scenario) -> RunReport {
        let mut state = RunState::new();
        info!(
            run = %self.run_name,
            programs = self.programs.len(),
            steps = scenario.steps().len(),
            fallback = scenario.fallback,
            image = %self.injector.path().display(),
            "resilience run starting"
        );

        match self.build_all(BuildMode::Creation) {
            Ok(binaries) => state.binaries = binaries,
            Err(error) => return self.fail(state, &error, &[]),
        }

        let steps = scenario.steps();
        for (index, step) in steps.iter().copied().enumerate() {
            state.steps_executed += 1;
            let result = match step.kind {
                StepKind::Test => self.test_step(&mut state, index, step),
                StepKind::Inject | StepKind::Scratch => {
                    self.corruption_step(&mut state, index, step)
                }
            };
            if let Err(error) = result {
                return self.fail(state, &error, &steps[index + 1..]);
            }
        }

        state.phase = RunPhase::Done;
        info!(
            run = %self.run_name,
            steps = state.steps_executed,
            corruption_total = state.corruption_total,
            "resilience run passed"
        );
        state.into_report(None)
    }

    fn fail(&mut self, state: RunState, error: &FrsError, remaining: &[ScenarioStep]) -> RunReport {
        error!(
            run = %self.run_name,
            phase = ?state.phase,
            class = error.class(),
            %error,
            "resilience run failed"
        );
        for step in remaining {
            self.log.push(StepLogEntry::skip(
                &self.run_name,
                &step.kind.to_string(),
                "not executed after failure",
            ));
        }
        state.into_report(Some(error))
    }

    fn build_all(&mut self, mode: BuildMode) -> Result<Vec<ValidationBinary>> {
        let step_name = if mode.allows_creation() {
            "build"
        } else {
            "recompile"
        };
        if self.programs.is_empty() {
            warn!("no validation programs to build");
        }
        let started = Instant::now();
        let input = serde_json::json!({ "mode": mode, "programs": self.programs.len() });
        let mut binaries = Vec::with_capacity(self.programs.len());
        for program in &self.programs {
            match self.builder.build(program, mode) {
                Ok(binary) => {
                    debug!(program = %program.name, ?mode, path = %binary.path.display(), "built");
                    binaries.push(binary);
                }
                Err(error) => {
                    self.log.push(StepLogEntry::err(
                        &self.run_name,
                        step_name,
                        input,
                        started.elapsed(),
                        &error.to_string(),
                    ));
                    return Err(error);
                }
            }
        }
        info!(?mode, binaries = binaries.len(), "validation programs built");
        self.log.push(StepLogEntry::ok(
            &self.run_name,
            step_name,
            input,
            serde_json::json!({ "binaries": binaries.len() }),
            started.elapsed(),
        ));
        Ok(binaries)
    }

    fn run_binaries(&mut self, binaries: &[ValidationBinary], workload: u64) -> Result<()> {
        for binary in binaries {
            let exit_code = self.runner.run(binary, workload)?;
            if exit_code != 0 {
                warn!(binary = %binary.name, exit_code, workload, "validation binary failed");
                return Err(FrsError::TestFailure {
                    binary: binary.name.clone(),
                    exit_code,
                    workload,
                });
            }
            debug!(binary = %binary.name, workload, "validation binary passed");
        }
        Ok(())
    }

    fn test_step(&mut self, state: &mut RunState, index: usize, step: ScenarioStep) -> Result<()> {
        state.phase = RunPhase::Testing;
        let started = Instant::now();
        let input = step_input(index, step);

        if let Err(error) = self.run_binaries(&state.binaries, step.magnitude) {
            state.record(index, step, StepOutcome::Failed).error = Some(error.to_string());
            self.log.push(StepLogEntry::err(
                &self.run_name,
                "test",
                input,
                started.elapsed(),
                &error.to_string(),
            ));
            return Err(error);
        }

        state.record(index, step, StepOutcome::Passed);
        info!(
            step = index,
            workload = step.magnitude,
            binaries = state.binaries.len(),
            "test step passed"
        );
        self.log.push(StepLogEntry::ok(
            &self.run_name,
            "test",
            input,
            serde_json::json!({ "binaries": state.binaries.len() }),
            started.elapsed(),
        ));

        if !state.recompiled {
            state.phase = RunPhase::Recompiling;
            state.binaries = self.build_all(BuildMode::NoCreation)?;
            state.recompiled = true;
        }
        Ok(())
    }

    fn strategy_for(&self, index: usize, step: ScenarioStep) -> Result<CorruptionStrategy> {
        let magnitude = usize::try_from(step.magnitude).map_err(|_| {
            FrsError::InvalidCorruptionParameters(format!(
                "magnitude {} does not fit the address space",
                step.magnitude
            ))
        })?;
        let seed = derive_seed(self.corruption.seed, index as u64);
        Ok(if step.kind == StepKind::Scratch {
            self.corruption.scratch_strategy(magnitude, seed)
        } else {
            self.corruption.bitflip_strategy(magnitude, seed)
        })
    }

    fn corruption_step(
        &mut self,
        state: &mut RunState,
        index: usize,
        step: ScenarioStep,
    ) -> Result<()> {
        state.phase = if step.kind == StepKind::Scratch {
            RunPhase::Scratching
        } else {
            RunPhase::Injecting
        };
        let started = Instant::now();
        let strategy = self.strategy_for(index, step)?;
        let input = serde_json::json!({
            "index": index,
            "kind": step.kind,
            "magnitude": step.magnitude,
            "strategy": strategy,
        });
        let step_name = step.kind.to_string();

        match self.injector.inject(&strategy) {
            Ok(outcome) => {
                state.corruption_total += strategy.expected_corruption();
                let record = state.record(index, step, StepOutcome::Applied);
                record.mutations = Some(outcome.mutations);
                info!(
                    step = index,
                    strategy = %strategy,
                    mutations = outcome.mutations,
                    corruption_total = state.corruption_total,
                    "corruption applied"
                );
                self.log.push(StepLogEntry::ok(
                    &self.run_name,
                    &step_name,
                    input,
                    serde_json::json!({
                        "mutations": outcome.mutations,
                        "span": outcome.span,
                        "corruption_total": state.corruption_total,
                    }),
                    started.elapsed(),
                ));
                Ok(())
            }
            Err(error) => {
                let outcome = if error.is_fatal() {
                    StepOutcome::Failed
                } else {
                    StepOutcome::Skipped
                };
                state.record(index, step, outcome).error = Some(error.to_string());
                self.log.push(StepLogEntry::err(
                    &self.run_name,
                    &step_name,
                    input,
                    started.elapsed(),
                    &error.to_string(),
                ));
                if error.is_fatal() {
                    return Err(error);
                }
                warn!(step = index, %error, "corruption step skipped, continuing");
                Ok(())
            }
        }
    }
}

fn step_input(index: usize, step: ScenarioStep) -> serde_json::Value {
    serde_json::json!({ "index": index, "kind": step.kind, "magnitude": step.magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::EntryStatus;
    use std::collections::VecDeque;
    use std::io::Write;

    #[derive(Default)]
    struct RecordingBuilder {
        builds: Vec<(String, BuildMode)>,
        fail_on: Option<BuildMode>,
    }

    impl ValidationBuilder for RecordingBuilder {
        fn build(
            &mut self,
            program: &ValidationProgram,
            mode: BuildMode,
        ) -> Result<ValidationBinary> {
            self.builds.push((program.name.clone(), mode));
            if self.fail_on == Some(mode) {
                return Err(FrsError::Build {
                    program: program.name.clone(),
                    detail: "syntax error".to_owned(),
                });
            }
            Ok(ValidationBinary {
                name: program.name.clone(),
                path: PathBuf::from(format!("/bin/{}", program.name)),
                mode,
            })
        }
    }

    /// Exits with queued codes, then 0.
    #[derive(Default)]
    struct ScriptedRunner {
        exit_codes: VecDeque<i32>,
        calls: Vec<(String, u64, BuildMode)>,
    }

    impl ScriptedRunner {
        fn with_codes(codes: &[i32]) -> Self {
            Self {
                exit_codes: codes.iter().copied().collect(),
                calls: Vec::new(),
            }
        }
    }

    impl ValidationRunner for ScriptedRunner {
        fn run(&mut self, binary: &ValidationBinary, workload: u64) -> Result<i32> {
            let call = (binary.name.clone(), workload, binary.mode);
            self.calls.push(call);
            Ok(self.exit_codes.pop_front().unwrap_or(0))
        }
    }

    fn programs(names: &[&str]) -> Vec<ValidationProgram> {
        names
            .iter()
            .map(|name| ValidationProgram {
                name: (*name).to_owned(),
                source: PathBuf::from(format!("{name}.c")),
            })
            .collect()
    }

    fn image(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0_u8; len]).unwrap();
        file.flush().unwrap();
        file
    }

    fn scenario(text: &str) -> Scenario {
        Scenario::parse(text).unwrap()
    }

    #[test]
    fn first_test_failure_stops_the_run() {
        let img = image(4096);
        let mut builder = RecordingBuilder::default();
        let mut runner = ScriptedRunner::with_codes(&[1]);
        let mut orchestrator = Orchestrator::new(
            &mut builder,
            &mut runner,
            programs(&["test_simple"]),
            img.path(),
            CorruptionConfig::default(),
        );

        let report = orchestrator.run(&scenario("T 10\nI 5\nT 10"));
        let skipped = orchestrator
            .log()
            .entries()
            .iter()
            .filter(|entry| entry.status == EntryStatus::Skip)
            .count();
        drop(orchestrator);

        assert!(!report.passed);
        assert_eq!(report.final_phase, RunPhase::Failed);
        assert_eq!(report.steps_executed, 1);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].outcome, StepOutcome::Failed);
        assert!(!report.recompiled);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failure.as_ref().unwrap().class, "test_failure");
        assert_eq!(skipped, 2);

        assert_eq!(runner.calls.len(), 1);
        for (_, mode) in &builder.builds {
            assert_eq!(*mode, BuildMode::Creation);
        }
        assert_eq!(std::fs::read(img.path()).unwrap(), vec![0_u8; 4096]);
    }

    #[test]
    fn recompiles_exactly_once_after_first_passing_test() {
        let img = image(4096);
        let mut builder = RecordingBuilder::default();
        let mut runner = ScriptedRunner::default();
        let report = Orchestrator::new(
            &mut builder,
            &mut runner,
            programs(&["test_a", "test_b"]),
            img.path(),
            CorruptionConfig::default(),
        )
        .run(&scenario("T 1\nT 2\nI 3\nT 4"));

        assert!(report.passed);
        assert!(report.recompiled);
        assert_eq!(report.final_phase, RunPhase::Done);
        assert_eq!(
            builder.builds,
            [
                ("test_a".to_owned(), BuildMode::Creation),
                ("test_b".to_owned(), BuildMode::Creation),
                ("test_a".to_owned(), BuildMode::NoCreation),
                ("test_b".to_owned(), BuildMode::NoCreation),
            ]
        );
        let modes: Vec<BuildMode> = runner.calls.iter().map(|(_, _, mode)| *mode).collect();
        assert_eq!(modes[..2], [BuildMode::Creation, BuildMode::Creation]);
        assert!(modes[2..].iter().all(|mode| *mode == BuildMode::NoCreation));
        let workloads: Vec<u64> = runner.calls.iter().map(|(_, w, _)| *w).collect();
        assert_eq!(workloads, [1, 1, 2, 2, 4, 4]);
    }

    #[test]
    fn corruption_counter_accumulates_expected_values() {
        let img = image(4096);
        let corruption = CorruptionConfig {
            scratch_width: 2,
            scratch_intensity: 0.5,
            ..CorruptionConfig::default()
        };
        let report = Orchestrator::new(
            RecordingBuilder::default(),
            ScriptedRunner::default(),
            Vec::new(),
            img.path(),
            corruption,
        )
        .run(&scenario("I 100\nS 50"));

        assert!(report.passed);
        assert!((report.corruption_total - 150.0).abs() < 1e-9);
        assert!((report.steps[0].corruption_total - 100.0).abs() < 1e-9);
        assert_eq!(report.steps[0].mutations, Some(100));
        assert!(std::fs::read(img.path()).unwrap().iter().any(|b| *b != 0));
    }

    #[test]
    fn injection_io_errors_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ScriptedRunner::default();
        let report = Orchestrator::new(
            RecordingBuilder::default(),
            &mut runner,
            programs(&["test_simple"]),
            dir.path().join("missing.img"),
            CorruptionConfig::default(),
        )
        .run(&scenario("I 5\nS 8\nT 1"));

        assert!(report.passed);
        assert_eq!(report.steps_executed, 3);
        assert_eq!(report.steps[0].outcome, StepOutcome::Skipped);
        assert_eq!(report.steps[1].outcome, StepOutcome::Skipped);
        assert!(report.corruption_total.abs() < f64::EPSILON);
        assert_eq!(runner.calls.len(), 1);
    }

    #[test]
    fn build_failure_is_fatal_before_any_step() {
        let img = image(64);
        let mut runner = ScriptedRunner::default();
        let report = Orchestrator::new(
            RecordingBuilder {
                fail_on: Some(BuildMode::Creation),
                ..RecordingBuilder::default()
            },
            &mut runner,
            programs(&["test_simple"]),
            img.path(),
            CorruptionConfig::default(),
        )
        .run(&Scenario::fallback());

        assert!(!report.passed);
        assert_eq!(report.steps_executed, 0);
        assert_eq!(report.exit_code(), 2);
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn recompilation_failure_is_fatal() {
        let img = image(64);
        let report = Orchestrator::new(
            RecordingBuilder {
                fail_on: Some(BuildMode::NoCreation),
                ..RecordingBuilder::default()
            },
            ScriptedRunner::default(),
            programs(&["test_simple"]),
            img.path(),
            CorruptionConfig::default(),
        )
        .run(&scenario("T 1\nI 1\nT 1"));

        assert!(!report.passed);
        assert_eq!(report.steps_executed, 1);
        assert_eq!(report.steps[0].outcome, StepOutcome::Passed);
        assert_eq!(report.failure.unwrap().class, "build");
    }

    #[test]
    fn oversized_scratch_is_fatal_and_leaves_the_image_alone() {
        let img = image(32);
        let report = Orchestrator::new(
            RecordingBuilder::default(),
            ScriptedRunner::default(),
            Vec::new(),
            img.path(),
            CorruptionConfig::default(),
        )
        .run(&scenario("S 33\nI 1"));

        assert!(!report.passed);
        assert_eq!(report.exit_code(), 3);
        assert_eq!(report.steps_executed, 1);
        assert_eq!(std::fs::read(img.path()).unwrap(), vec![0_u8; 32]);
    }

    #[test]
    fn test_step_stops_at_the_first_failing_binary() {
        let img = image(64);
        let mut runner = ScriptedRunner::with_codes(&[0, 2, 0]);
        let report = Orchestrator::new(
            RecordingBuilder::default(),
            &mut runner,
            programs(&["test_a", "test_b", "test_c"]),
            img.path(),
            CorruptionConfig::default(),
        )
        .run(&scenario("T 7"));

        assert!(!report.passed);
        assert_eq!(runner.calls.len(), 2);
        assert_eq!(
            report.failure.unwrap().message,
            "validation binary test_b failed with exit code 2 (workload 7)"
        );
    }

    #[test]
    fn report_serializes_as_json() {
        let img = image(1024);
        let report = Orchestrator::new(
            RecordingBuilder::default(),
            ScriptedRunner::default(),
            Vec::new(),
            img.path(),
            CorruptionConfig::default(),
        )
        .run(&scenario("T 1\nI 2"));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["passed"], true);
        assert_eq!(value["final_phase"], "done");
        assert_eq!(value["steps"][1]["outcome"], "applied");
        assert!(value.get("failure").is_none());
    }
}
