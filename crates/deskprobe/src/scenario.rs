//! Scenario driver.
//!
//! A scenario is an ordered list of [`Step`]s run in one fresh browsing
//! context. Assertions that do not hold are recorded and the scenario goes
//! on; any [`HarnessError`] aborts it after an error screenshot. The context
//! is released on every path.

use crate::assertion::{
    self, region_menu_check, CheckOutcome, Count, ExpectedGeometry, RegionProbe,
};
use crate::config::HarnessConfig;
use crate::driver::{ContextPool, MouseButton, PageDriver};
use crate::locator::{Locator, Occurrence};
use crate::reporter::{CheckRecord, Checkpoint, ResultSink, RunReport, ScenarioResult};
use crate::result::{HarnessError, HarnessResult};
use crate::session::{self, SessionSeed};
use crate::wait::{self, ReadyCondition, WaitOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Instrument};

/// One instruction of a scenario
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Navigate to a route of the application
    Navigate {
        /// Route, e.g. `/desktop`
        path: String,
    },
    /// Wait for a readiness condition
    AwaitReady(ReadyCondition),
    /// Wait for the target to be visible, then click its center
    Click(Locator),
    /// Pause for the configured settle delay
    Settle,
    /// Record whether an element is visible
    AssertVisible {
        /// Check name
        name: String,
        /// Element
        target: Locator,
    },
    /// Record whether text is visible at an occurrence
    AssertText {
        /// Check name
        name: String,
        /// Container searched; the whole page when `None`
        within: Option<Locator>,
        /// Text to find
        text: String,
        /// Which match
        occurrence: Occurrence,
    },
    /// Record whether the match count is as expected
    AssertExists {
        /// Check name
        name: String,
        /// Elements
        target: Locator,
        /// Expected count
        count: Count,
    },
    /// Record whether a window is centered in the viewport
    AssertCentered {
        /// Check name
        name: String,
        /// Window
        target: Locator,
    },
    /// Record that the session was not bounced to the login route
    AssertNotRedirected {
        /// Check name
        name: String,
    },
    /// Run a context-menu probe per region, one record each
    ProbeRegions(Vec<RegionProbe>),
    /// Capture `<artifact_dir>/<name>.png`
    Checkpoint(String),
}

impl Step {
    /// Short label for logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::AwaitReady(_) => "await_ready",
            Self::Click(_) => "click",
            Self::Settle => "settle",
            Self::AssertVisible { .. } => "assert_visible",
            Self::AssertText { .. } => "assert_text",
            Self::AssertExists { .. } => "assert_exists",
            Self::AssertCentered { .. } => "assert_centered",
            Self::AssertNotRedirected { .. } => "assert_not_redirected",
            Self::ProbeRegions(_) => "probe_regions",
            Self::Checkpoint(_) => "checkpoint",
        }
    }
}

/// A named, ordered list of steps
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDefinition {
    /// Scenario name, also used for the error screenshot
    pub name: String,
    /// One-line description
    pub description: String,
    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl ScenarioDefinition {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// Executes the steps of one scenario on one page
#[derive(Debug)]
pub struct ScenarioRunner<'a, P: PageDriver + ?Sized> {
    page: &'a P,
    config: &'a HarnessConfig,
    seed: SessionSeed,
    verified: bool,
}

impl<'a, P: PageDriver + ?Sized> ScenarioRunner<'a, P> {
    /// Create a runner for a page
    #[must_use]
    pub fn new(page: &'a P, config: &'a HarnessConfig) -> Self {
        Self {
            page,
            config,
            seed: SessionSeed::from_config(&config.session),
            verified: false,
        }
    }

    /// Seed the session, then run every step in order
    ///
    /// # Errors
    ///
    /// Returns the first hard failure; checks recorded before it stay in
    /// `result`.
    pub async fn execute(
        &mut self,
        definition: &ScenarioDefinition,
        result: &mut ScenarioResult,
        sink: &mut dyn ResultSink,
    ) -> HarnessResult<()> {
        session::seed(self.page, &self.seed).await?;
        for (index, step) in definition.steps.iter().enumerate() {
            debug!(index, step = step.label(), "step");
            self.step(step, result, sink).await?;
        }
        Ok(())
    }

    async fn step(
        &mut self,
        step: &Step,
        result: &mut ScenarioResult,
        sink: &mut dyn ResultSink,
    ) -> HarnessResult<()> {
        let config = self.config;
        match step {
            Step::Navigate { path } => {
                wait::goto(self.page, &config.url(path)).await?;
                if !self.verified {
                    session::verify(self.page, &self.seed).await?;
                    self.verified = true;
                }
            }
            Step::AwaitReady(condition) => {
                wait::await_ready(self.page, condition, &self.wait_options()).await?;
            }
            Step::Click(target) => {
                let bbox = wait::await_visible(self.page, target, &self.wait_options()).await?;
                self.page
                    .click_at(bbox.center(), MouseButton::Primary)
                    .await?;
            }
            Step::Settle => tokio::time::sleep(config.timeouts.settle()).await,
            Step::AssertVisible { name, target } => {
                let outcome = assertion::is_visible(self.page, target).await?;
                Self::record(name, outcome, result, sink);
            }
            Step::AssertText {
                name,
                within,
                text,
                occurrence,
            } => {
                let outcome =
                    assertion::contains_text(self.page, within.as_ref(), text, *occurrence).await?;
                Self::record(name, outcome, result, sink);
            }
            Step::AssertExists {
                name,
                target,
                count,
            } => {
                let outcome = assertion::exists(self.page, target, *count).await?;
                Self::record(name, outcome, result, sink);
            }
            Step::AssertCentered { name, target } => {
                let geometry = ExpectedGeometry::from_config(config);
                let outcome = assertion::window_centered(self.page, target, &geometry).await?;
                Self::record(name, outcome, result, sink);
            }
            Step::AssertNotRedirected { name } => {
                let outcome = assertion::path_is_not(self.page, &config.markers.login_path).await?;
                Self::record(name, outcome, result, sink);
            }
            Step::ProbeRegions(probes) => {
                for probe in probes {
                    let outcome = region_menu_check(
                        self.page,
                        probe,
                        &config.markers.context_menu,
                        config.dismiss_point,
                        config.timeouts.settle(),
                    )
                    .await?;
                    Self::record(&format!("context menu: {}", probe.name), outcome, result, sink);
                }
            }
            Step::Checkpoint(name) => {
                let path = config.artifact_dir.join(format!("{name}.png"));
                capture(self.page, &path).await?;
                let checkpoint = Checkpoint {
                    name: name.clone(),
                    path: path.clone(),
                };
                sink.checkpoint(&result.scenario, &checkpoint);
                result.screenshots.push(checkpoint);
                result.screenshot_path = Some(path);
            }
        }
        Ok(())
    }

    fn wait_options(&self) -> WaitOptions {
        WaitOptions::from(&self.config.timeouts)
    }

    fn record(
        name: &str,
        outcome: CheckOutcome,
        result: &mut ScenarioResult,
        sink: &mut dyn ResultSink,
    ) {
        let record = CheckRecord {
            name: name.to_string(),
            passed: outcome.passed,
            detail: outcome.detail,
        };
        if record.passed {
            debug!(check = name, "passed");
        } else {
            info!(check = name, detail = %record.detail, "check failed");
        }
        sink.record(&result.scenario, &record);
        result.checks.push(record);
    }
}

/// Screenshot the page into a PNG file
async fn capture<P: PageDriver + ?Sized>(page: &P, path: &Path) -> HarnessResult<()> {
    let png = page.screenshot().await?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, png)?;
    debug!(path = %path.display(), "screenshot written");
    Ok(())
}

/// Runs scenarios against a pool of browsing contexts
#[derive(Debug)]
pub struct Harness<C: ContextPool> {
    pool: C,
    config: HarnessConfig,
}

impl<C: ContextPool> Harness<C> {
    /// Create a harness
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid configuration
    pub fn new(pool: C, config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self { pool, config })
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Get the context pool
    #[must_use]
    pub const fn pool(&self) -> &C {
        &self.pool
    }

    /// Give back the context pool
    #[must_use]
    pub fn into_pool(self) -> C {
        self.pool
    }

    /// Run one scenario in a fresh browsing context
    ///
    /// # Errors
    ///
    /// Returns the hard failure that aborted the scenario, after the error
    /// screenshot was attempted and the context released.
    pub async fn run(
        &self,
        definition: &ScenarioDefinition,
        sink: &mut dyn ResultSink,
    ) -> HarnessResult<ScenarioResult> {
        let (result, error) = self.execute(definition, sink).await;
        match error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    /// Run scenarios one after another, each in its own context
    pub async fn run_all(
        &self,
        definitions: &[ScenarioDefinition],
        sink: &mut dyn ResultSink,
    ) -> RunReport {
        let mut report = RunReport::new(&self.config.base_url);
        for definition in definitions {
            let (result, _) = self.execute(definition, sink).await;
            report.results.push(result);
        }
        info!(
            scenarios = report.results.len(),
            checks = report.total_checks(),
            failed = report.failed_checks(),
            aborted = report.aborted(),
            "run finished"
        );
        report
    }

    async fn execute(
        &self,
        definition: &ScenarioDefinition,
        sink: &mut dyn ResultSink,
    ) -> (ScenarioResult, Option<HarnessError>) {
        let span = info_span!("scenario", name = %definition.name);
        async {
            sink.scenario_started(&definition.name);
            let mut result = ScenarioResult::new(&definition.name);

            let outcome = match self.pool.new_context(self.config.viewport).await {
                Ok(page) => {
                    let outcome = ScenarioRunner::new(&page, &self.config)
                        .execute(definition, &mut result, sink)
                        .await;
                    let outcome = match outcome {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            let shot = self.error_screenshot(&page, &definition.name).await;
                            if let Some(path) = &shot {
                                result.screenshot_path = Some(path.clone());
                            }
                            sink.error(&definition.name, &e, shot.as_deref());
                            Err(e)
                        }
                    };
                    if let Err(e) = page.close().await {
                        warn!(error = %e, "failed to release browsing context");
                    }
                    outcome
                }
                Err(e) => {
                    sink.error(&definition.name, &e, None);
                    Err(e)
                }
            };

            if let Err(e) = &outcome {
                warn!(kind = e.kind(), error = %e, "scenario aborted");
                result.error = Some(e.to_string());
            }
            sink.scenario_finished(&result);
            (result, outcome.err())
        }
        .instrument(span)
        .await
    }

    async fn error_screenshot<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        scenario: &str,
    ) -> Option<PathBuf> {
        let path = self.config.artifact_dir.join(format!("{scenario}-error.png"));
        match capture(page, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(error = %e, "could not capture error screenshot");
                None
            }
        }
    }
}
