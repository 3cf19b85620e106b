//! Structured run log.
//!
//! One JSON entry per orchestrator step, written as NDJSON. This is separate
//! from `tracing` output: it is the machine-readable record of a run.

use frs_error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Ok,
    Error,
    Skip,
}

/// A single structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLogEntry {
    /// Seconds since the Unix epoch, as a decimal string.
    pub ts: String,
    pub run: String,
    pub step: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub duration_us: u64,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepLogEntry {
    fn now() -> String {
        let since_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        since_epoch.as_secs().to_string()
    }

    fn micros(duration: Duration) -> u64 {
        u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn ok(
        run: &str,
        step: &str,
        input: serde_json::Value,
        output: serde_json::Value,
        duration: Duration,
    ) -> Self {
        Self {
            ts: Self::now(),
            run: run.to_owned(),
            step: step.to_owned(),
            input,
            output,
            duration_us: Self::micros(duration),
            status: EntryStatus::Ok,
            error: None,
        }
    }

    #[must_use]
    pub fn err(
        run: &str,
        step: &str,
        input: serde_json::Value,
        duration: Duration,
        error: &str,
    ) -> Self {
        Self {
            ts: Self::now(),
            run: run.to_owned(),
            step: step.to_owned(),
            input,
            output: serde_json::Value::Object(serde_json::Map::new()),
            duration_us: Self::micros(duration),
            status: EntryStatus::Error,
            error: Some(error.to_owned()),
        }
    }

    #[must_use]
    pub fn skip(run: &str, step: &str, reason: &str) -> Self {
        Self {
            ts: Self::now(),
            run: run.to_owned(),
            step: step.to_owned(),
            input: serde_json::json!({ "reason": reason }),
            output: serde_json::Value::Object(serde_json::Map::new()),
            duration_us: 0,
            status: EntryStatus::Skip,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<StepLogEntry>,
}

impl RunLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: StepLogEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[StepLogEntry] {
        &self.entries
    }

    /// Newline-delimited JSON, one entry per line.
    pub fn to_ndjson(&self) -> Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            let line = serde_json::to_string(entry).map_err(std::io::Error::from)?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ndjson()?)?;
        Ok(())
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.status == EntryStatus::Error)
    }
}
