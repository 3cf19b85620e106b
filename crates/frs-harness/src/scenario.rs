//! Scenario scripts.
//!
//! One step per line, `<T|I|S> <magnitude>`. Blank lines and lines starting
//! with `#` are ignored. Any other line that is not exactly a known tag plus a
//! non-negative integer is skipped with a warning.

use frs_error::{FrsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Run every validation binary with the magnitude as workload size.
    Test,
    /// Bit-flip corruption; magnitude is the number of flips.
    Inject,
    /// Scratch corruption; magnitude is the scratch length.
    Scratch,
}

impl StepKind {
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            Self::Test => 'T',
            Self::Inject => 'I',
            Self::Scratch => 'S',
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "T" => Some(Self::Test),
            "I" => Some(Self::Inject),
            "S" => Some(Self::Scratch),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Inject => write!(f, "inject"),
            Self::Scratch => write!(f, "scratch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub kind: StepKind,
    pub magnitude: u64,
}

impl ScenarioStep {
    #[must_use]
    pub const fn new(kind: StepKind, magnitude: u64) -> Self {
        Self { kind, magnitude }
    }
}

impl fmt::Display for ScenarioStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.tag(), self.magnitude)
    }
}

const FALLBACK_STEPS: [ScenarioStep; 7] = [
    ScenarioStep::new(StepKind::Test, 1000),
    ScenarioStep::new(StepKind::Inject, 100_000),
    ScenarioStep::new(StepKind::Test, 1000),
    ScenarioStep::new(StepKind::Inject, 100_000),
    ScenarioStep::new(StepKind::Test, 1000),
    ScenarioStep::new(StepKind::Inject, 100_000),
    ScenarioStep::new(StepKind::Test, 1000),
];

/// An ordered, immutable list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    steps: Vec<ScenarioStep>,
    /// True when the built-in sequence replaced a missing or unusable script.
    pub fallback: bool,
}

impl Scenario {
    #[must_use]
    pub fn new(steps: Vec<ScenarioStep>) -> Self {
        Self {
            steps,
            fallback: false,
        }
    }

    /// `T 1000, I 100000, T 1000, I 100000, T 1000, I 100000, T 1000`.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            steps: FALLBACK_STEPS.to_vec(),
            fallback: true,
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[ScenarioStep] {
        &self.steps
    }

    #[must_use]
    pub fn test_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.kind == StepKind::Test)
            .count()
    }

    /// Parse script text. Fails only when no usable step remains.
    pub fn parse(text: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some(step) => steps.push(step),
                None => warn!(
                    line = number + 1,
                    text = line,
                    "skipping malformed scenario line"
                ),
            }
        }
        if steps.is_empty() {
            return Err(FrsError::ScenarioParse(
                "script contains no valid steps".to_owned(),
            ));
        }
        debug!(steps = steps.len(), "scenario parsed");
        Ok(Self::new(steps))
    }

    /// Parse script text, substituting the built-in sequence if nothing
    /// usable is found.
    #[must_use]
    pub fn parse_or_fallback(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|error| {
            warn!(%error, "using built-in fallback scenario");
            Self::fallback()
        })
    }

    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| {
            FrsError::ScenarioParse(format!("cannot read {}: {error}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Load `path` if given; any failure falls back to the built-in sequence.
    #[must_use]
    pub fn load_or_fallback(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            debug!("no scenario script given, using built-in fallback");
            return Self::fallback();
        };
        Self::load(path).unwrap_or_else(|error| {
            warn!(%error, path = %path.display(), "using built-in fallback scenario");
            Self::fallback()
        })
    }
}

fn parse_line(line: &str) -> Option<ScenarioStep> {
    let mut fields = line.split_whitespace();
    let kind = StepKind::from_tag(fields.next()?)?;
    let magnitude = fields.next()?.parse::<u64>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(ScenarioStep { kind, magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(kind: StepKind, magnitude: u64) -> ScenarioStep {
        ScenarioStep { kind, magnitude }
    }

    #[test]
    fn parses_steps_in_order() {
        let scenario = Scenario::parse("# warmup\nT 10\n\nI 500\nS 64\n   T 20\n").unwrap();
        assert_eq!(
            scenario.steps(),
            [
                step(StepKind::Test, 10),
                step(StepKind::Inject, 500),
                step(StepKind::Scratch, 64),
                step(StepKind::Test, 20),
            ]
        );
        assert!(!scenario.fallback);
    }

    #[test]
    fn unknown_tag_is_skipped_and_parsing_continues() {
        let scenario = Scenario::parse("X 5\nT 7").unwrap();
        assert_eq!(scenario.steps(), [step(StepKind::Test, 7)]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "T\nI -3\nS 4 4\nt 9\nI 1.5\nI 12";
        let scenario = Scenario::parse(text).unwrap();
        assert_eq!(scenario.steps(), [step(StepKind::Inject, 12)]);
    }

    #[test]
    fn empty_or_malformed_scripts_fall_back() {
        for text in ["", "# only a comment\n\n", "garbage\nX 1\nT x"] {
            let scenario = Scenario::parse_or_fallback(text);
            assert_eq!(scenario, Scenario::fallback(), "{text:?}");
        }
    }

    #[test]
    fn fallback_sequence_is_fixed() {
        let rendered: Vec<String> = Scenario::fallback()
            .steps()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rendered,
            [
                "T 1000", "I 100000", "T 1000", "I 100000", "T 1000", "I 100000", "T 1000"
            ]
        );
        assert_eq!(Scenario::fallback().test_steps(), 4);
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.txt");
        assert!(matches!(
            Scenario::load(&missing),
            Err(FrsError::ScenarioParse(_))
        ));
        assert!(Scenario::load_or_fallback(Some(&missing)).fallback);
        assert!(Scenario::load_or_fallback(None).fallback);
    }

    #[test]
    fn loads_script_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.txt");
        std::fs::write(&path, "T 1\nS 2\n").unwrap();
        let scenario = Scenario::load_or_fallback(Some(&path));
        assert_eq!(
            scenario.steps(),
            [step(StepKind::Test, 1), step(StepKind::Scratch, 2)]
        );
    }
}
