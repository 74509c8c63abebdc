//! Console reporting of scenario results

use console::{style, Style, Term};
use deskprobe::{CheckRecord, Checkpoint, HarnessError, ResultSink, RunReport, ScenarioResult};
use std::path::Path;

/// Prints one marked line per check to stdout
#[derive(Debug)]
pub struct ConsoleReporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ConsoleReporter {
    /// Create a new console reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    fn marker(&self, text: &str, style: &Style) -> String {
        if self.use_color {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Line printed for a check
    #[must_use]
    pub fn check_line(&self, scenario: &str, check: &CheckRecord) -> String {
        if check.passed {
            let marker = self.marker("SUCCESS", &Style::new().green().bold());
            format!("{marker}: {scenario} / {}", check.name)
        } else {
            let marker = self.marker("FAILURE", &Style::new().red().bold());
            format!("{marker}: {scenario} / {}: {}", check.name, check.detail)
        }
    }

    /// Line printed when a scenario aborts
    #[must_use]
    pub fn error_line(
        &self,
        scenario: &str,
        error: &HarnessError,
        screenshot: Option<&Path>,
    ) -> String {
        let marker = self.marker("ERROR", &Style::new().red().bold().reverse());
        match screenshot {
            Some(path) => format!(
                "{marker}: {scenario}: {error} (screenshot: {})",
                path.display()
            ),
            None => format!("{marker}: {scenario}: {error} (no screenshot)"),
        }
    }

    /// Closing line for a whole run
    #[must_use]
    pub fn summary_line(&self, report: &RunReport) -> String {
        let total = report.total_checks();
        let failed = report.failed_checks();
        let aborted = report.aborted();
        let status = if report.passed() {
            self.marker("PASSED", &Style::new().green().bold())
        } else {
            self.marker("FAILED", &Style::new().red().bold())
        };
        format!(
            "{status} {} scenarios, {total} checks ({} passed, {failed} failed, {aborted} aborted)",
            report.results.len(),
            total - failed,
        )
    }

    /// Print the run summary
    pub fn summary(&self, report: &RunReport) {
        if self.quiet && report.passed() {
            return;
        }
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&self.summary_line(report));
    }

    /// Print a plain informational line
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(message);
    }
}

impl ResultSink for ConsoleReporter {
    fn scenario_started(&mut self, scenario: &str) {
        if self.quiet {
            return;
        }
        let title = if self.use_color {
            style(scenario).bold().underlined().to_string()
        } else {
            format!("=== {scenario} ===")
        };
        let _ = self.term.write_line(&title);
    }

    fn record(&mut self, scenario: &str, check: &CheckRecord) {
        // Failures are printed even in quiet mode
        if check.passed && self.quiet {
            return;
        }
        let _ = self.term.write_line(&self.check_line(scenario, check));
    }

    fn checkpoint(&mut self, _scenario: &str, checkpoint: &Checkpoint) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(&format!(
            "  screenshot {} -> {}",
            checkpoint.name,
            checkpoint.path.display()
        ));
    }

    fn error(&mut self, scenario: &str, error: &HarnessError, screenshot: Option<&Path>) {
        let _ = self
            .term
            .write_line(&self.error_line(scenario, error, screenshot));
    }

    fn scenario_finished(&mut self, _result: &ScenarioResult) {
        if !self.quiet {
            let _ = self.term.write_line("");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plain() -> ConsoleReporter {
        ConsoleReporter::new(false, false)
    }

    fn record(name: &str, passed: bool, detail: &str) -> CheckRecord {
        CheckRecord {
            name: name.to_string(),
            passed,
            detail: detail.to_string(),
        }
    }

    #[test]
    fn test_success_line() {
        let line = plain().check_line("context-menu", &record("context menu: dock", true, "ok"));
        assert_eq!(line, "SUCCESS: context-menu / context menu: dock");
    }

    #[test]
    fn test_failure_line_carries_detail() {
        let line = plain().check_line(
            "window-centering",
            &record("Settings window centered", false, "actual (260, 100)"),
        );
        assert!(line.starts_with("FAILURE: "));
        assert!(line.ends_with("actual (260, 100)"));
    }

    #[test]
    fn test_error_line_names_screenshot() {
        let err = HarnessError::bootstrap("storage blocked");
        let shot = PathBuf::from("verification/context-menu-error.png");
        let line = plain().error_line("context-menu", &err, Some(&shot));
        assert!(line.starts_with("ERROR: context-menu: "));
        assert!(line.contains("storage blocked"));
        assert!(line.contains("context-menu-error.png"));

        let line = plain().error_line("context-menu", &err, None);
        assert!(line.contains("no screenshot"));
    }

    #[test]
    fn test_summary_line_counts() {
        let mut ok = ScenarioResult::new("a");
        ok.checks.push(record("one", true, ""));
        let mut bad = ScenarioResult::new("b");
        bad.checks.push(record("two", false, "nope"));
        bad.error = Some("timed out".to_string());
        let mut report = RunReport::new("http://localhost:5173");
        report.results = vec![ok, bad];

        let line = plain().summary_line(&report);

        assert!(line.starts_with("FAILED 2 scenarios, 2 checks"));
        assert!(line.contains("1 passed, 1 failed, 1 aborted"));
    }

    #[test]
    fn test_colored_marker_keeps_text() {
        console::set_colors_enabled(true);
        let reporter = ConsoleReporter::new(true, false);
        let line = reporter.check_line("s", &record("c", true, ""));
        assert!(line.contains("SUCCESS"));
    }
}
