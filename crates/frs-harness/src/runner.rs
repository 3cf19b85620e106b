//! Runs validation binaries as child processes.

use crate::orchestrator::{ValidationBinary, ValidationRunner};
use frs_error::Result;
use std::process::{Command, ExitStatus};
use tracing::{debug, warn};

/// Exit code reported for a binary killed by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALED_EXIT_CODE)
}

impl ValidationRunner for ProcessRunner {
    fn run(&mut self, binary: &ValidationBinary, workload: u64) -> Result<i32> {
        let output = Command::new(&binary.path)
            .arg(workload.to_string())
            .output()?;
        let code = exit_code(output.status);
        if code == 0 {
            debug!(binary = %binary.name, workload, "binary exited cleanly");
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                binary = %binary.name,
                workload,
                exit_code = code,
                stderr = %stderr.trim(),
                "binary reported failure"
            );
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::BuildMode;
    use frs_error::FrsError;
    use std::path::PathBuf;

    fn binary(path: &str) -> ValidationBinary {
        ValidationBinary {
            name: path.to_owned(),
            path: PathBuf::from(path),
            mode: BuildMode::Creation,
        }
    }

    #[test]
    fn reports_exit_codes() {
        let mut runner = ProcessRunner::new();
        assert_eq!(runner.run(&binary("true"), 1000).unwrap(), 0);
        assert_eq!(runner.run(&binary("false"), 1000).unwrap(), 1);
    }

    #[test]
    fn missing_binary_is_an_io_error() {
        let err = ProcessRunner::new()
            .run(&binary("/nonexistent/test_simple"), 1)
            .unwrap_err();
        assert!(matches!(err, FrsError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn signal_termination_is_a_failure() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(ExitStatus::from_raw(9)), SIGNALED_EXIT_CODE);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }
}
