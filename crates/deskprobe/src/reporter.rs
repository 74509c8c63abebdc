//! Scenario results and the sinks that receive them.
//!
//! ```text
//! ScenarioRunner ──record──► ResultSink ──► console (CLI)
//!        │                        └───────► MemorySink (tests)
//!        └──finish──► ScenarioResult ──► RunReport ──► JSON
//! ```

use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One evaluated check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Check name
    pub name: String,
    /// Whether it held
    pub passed: bool,
    /// What was observed
    pub detail: String,
}

/// A screenshot written at a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint name
    pub name: String,
    /// File written
    pub path: PathBuf,
}

/// Outcome of one scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub scenario: String,
    /// Checks in evaluation order
    pub checks: Vec<CheckRecord>,
    /// Screenshots in capture order
    pub screenshots: Vec<Checkpoint>,
    /// Last screenshot captured, including the error screenshot
    pub screenshot_path: Option<PathBuf>,
    /// Hard failure that aborted the scenario
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Start an empty result
    #[must_use]
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            checks: Vec::new(),
            screenshots: Vec::new(),
            screenshot_path: None,
            error: None,
        }
    }

    /// No failed check and no hard failure
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.checks.iter().all(|c| c.passed)
    }

    /// Checks that did not hold
    #[must_use]
    pub fn failures(&self) -> Vec<&CheckRecord> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    /// Look up a check by name
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckRecord> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Results of every scenario in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Application base URL
    pub base_url: String,
    /// Per-scenario results in run order
    pub results: Vec<ScenarioResult>,
}

impl RunReport {
    /// Create an empty report
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            results: Vec::new(),
        }
    }

    /// Every scenario passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }

    /// Total number of checks
    #[must_use]
    pub fn total_checks(&self) -> usize {
        self.results.iter().map(|r| r.checks.len()).sum()
    }

    /// Number of failed checks
    #[must_use]
    pub fn failed_checks(&self) -> usize {
        self.results.iter().map(|r| r.failures().len()).sum()
    }

    /// Number of scenarios aborted by a hard failure
    #[must_use]
    pub fn aborted(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Receives scenario events as they happen
pub trait ResultSink: Send {
    /// A scenario is about to run
    fn scenario_started(&mut self, _scenario: &str) {}

    /// A check was evaluated
    fn record(&mut self, scenario: &str, check: &CheckRecord);

    /// A checkpoint screenshot was written
    fn checkpoint(&mut self, _scenario: &str, _checkpoint: &Checkpoint) {}

    /// A hard failure aborted the scenario
    fn error(&mut self, scenario: &str, error: &HarnessError, screenshot: Option<&Path>);

    /// A scenario finished, successfully or not
    fn scenario_finished(&mut self, _result: &ScenarioResult) {}
}

/// Event seen by a [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// Scenario started
    Started(String),
    /// Check recorded
    Check(CheckRecord),
    /// Checkpoint written
    Checkpoint(Checkpoint),
    /// Hard failure
    Error {
        /// Error kind label
        kind: String,
        /// Error screenshot, if captured
        screenshot: Option<PathBuf>,
    },
    /// Scenario finished
    Finished(String),
}

/// Sink that keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Events in arrival order
    pub events: Vec<SinkEvent>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded checks in arrival order
    #[must_use]
    pub fn checks(&self) -> Vec<&CheckRecord> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Check(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Error kinds reported
    #[must_use]
    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Error { kind, .. } => Some(kind.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ResultSink for MemorySink {
    fn scenario_started(&mut self, scenario: &str) {
        self.events.push(SinkEvent::Started(scenario.to_string()));
    }

    fn record(&mut self, _scenario: &str, check: &CheckRecord) {
        self.events.push(SinkEvent::Check(check.clone()));
    }

    fn checkpoint(&mut self, _scenario: &str, checkpoint: &Checkpoint) {
        self.events.push(SinkEvent::Checkpoint(checkpoint.clone()));
    }

    fn error(&mut self, _scenario: &str, error: &HarnessError, screenshot: Option<&Path>) {
        self.events.push(SinkEvent::Error {
            kind: error.kind().to_string(),
            screenshot: screenshot.map(Path::to_path_buf),
        });
    }

    fn scenario_finished(&mut self, result: &ScenarioResult) {
        self.events.push(SinkEvent::Finished(result.scenario.clone()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn check(name: &str, passed: bool) -> CheckRecord {
        CheckRecord {
            name: name.to_string(),
            passed,
            detail: String::new(),
        }
    }

    #[test]
    fn test_scenario_passed() {
        let mut result = ScenarioResult::new("activity-monitor");
        result.checks.push(check("a", true));
        assert!(result.passed());
        result.checks.push(check("b", false));
        assert!(!result.passed());
        assert_eq!(result.failures().len(), 1);
        assert!(result.check("b").is_some());
    }

    #[test]
    fn test_error_fails_scenario() {
        let mut result = ScenarioResult::new("context-menu");
        result.error = Some("timed out".to_string());
        assert!(!result.passed());
    }

    #[test]
    fn test_report_counts() {
        let mut ok = ScenarioResult::new("a");
        ok.checks.push(check("x", true));
        let mut bad = ScenarioResult::new("b");
        bad.checks.push(check("y", false));
        bad.error = Some("driver".to_string());
        let report = RunReport {
            base_url: "http://localhost:5173".to_string(),
            results: vec![ok, bad],
        };
        assert!(!report.passed());
        assert_eq!(report.total_checks(), 2);
        assert_eq!(report.failed_checks(), 1);
        assert_eq!(report.aborted(), 1);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        let report = RunReport::new("http://localhost:5173");
        report.write_json(&path).unwrap();
        let parsed: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_memory_sink_collects() {
        let mut sink = MemorySink::new();
        sink.scenario_started("a");
        sink.record("a", &check("x", true));
        sink.error("a", &HarnessError::driver("gone"), None);
        assert_eq!(sink.checks().len(), 1);
        assert_eq!(sink.errors(), vec!["driver"]);
    }
}
