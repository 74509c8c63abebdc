//! Scenario selection and execution

use crate::config::{apply_overrides, load_harness_config};
use crate::commands::Overrides;
use crate::error::{CliError, CliResult};
use deskprobe::{catalog, HarnessConfig, ScenarioDefinition};
use std::path::Path;

/// Load the configuration file and apply flag overrides
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid
pub fn effective_config(path: Option<&Path>, overrides: &Overrides) -> CliResult<HarnessConfig> {
    let config = apply_overrides(load_harness_config(path)?, overrides);
    config.validate()?;
    Ok(config)
}

/// Resolve scenario names against the catalog; empty means all of them
///
/// # Errors
///
/// Returns an invalid argument error naming the first unknown scenario
pub fn select_scenarios(
    config: &HarnessConfig,
    names: &[String],
) -> CliResult<Vec<ScenarioDefinition>> {
    if names.is_empty() {
        return Ok(catalog::all(config));
    }
    names
        .iter()
        .map(|name| {
            catalog::by_name(config, name).ok_or_else(|| {
                CliError::invalid_argument(format!(
                    "unknown scenario {name:?} (known: {})",
                    catalog::SCENARIO_NAMES.join(", ")
                ))
            })
        })
        .collect()
}

/// Launch Chromium, run the scenarios and close the browser
///
/// The configuration is validated before Chromium starts, so an invalid
/// configuration never leaves a browser process behind.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the browser cannot
/// be launched
#[cfg(feature = "browser")]
pub async fn run_scenarios(
    config: HarnessConfig,
    scenarios: &[ScenarioDefinition],
    sink: &mut dyn deskprobe::ResultSink,
) -> CliResult<deskprobe::RunReport> {
    use deskprobe::{Browser, Harness};

    config.validate()?;
    let browser = Browser::launch(config.browser.clone()).await?;
    let harness = Harness::new(browser, config)?;
    let report = harness.run_all(scenarios, sink).await;
    if let Err(e) = harness.into_pool().close().await {
        tracing::warn!(error = %e, "browser did not shut down cleanly");
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_empty_selection_is_all() {
        let config = HarnessConfig::default();
        let selected = select_scenarios(&config, &[]).unwrap();
        assert_eq!(selected.len(), catalog::SCENARIO_NAMES.len());
    }

    #[test]
    fn test_selection_keeps_order() {
        let config = HarnessConfig::default();
        let selected =
            select_scenarios(&config, &names(&["window-centering", "context-menu"])).unwrap();
        let got: Vec<&str> = selected.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(got, vec!["window-centering", "context-menu"]);
    }

    #[test]
    fn test_unknown_scenario_is_rejected() {
        let config = HarnessConfig::default();
        let err = select_scenarios(&config, &names(&["context-menu", "nope"])).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
        assert!(err.to_string().contains("nope"));
        assert!(err.to_string().contains("activity-monitor"));
    }

    #[cfg(feature = "browser")]
    #[tokio::test]
    async fn test_invalid_config_fails_before_launch() {
        let mut config = HarnessConfig::default();
        config.browser.chromium_path = Some("/nonexistent/chromium".to_string());
        config.timeouts.ready_ms = 0;
        let mut sink = deskprobe::MemorySink::new();

        let err = run_scenarios(config, &[], &mut sink).await.unwrap_err();

        assert!(matches!(
            err,
            CliError::Harness(deskprobe::HarnessError::Config { .. })
        ));
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_effective_config_rejects_bad_url() {
        let overrides = Overrides {
            base_url: Some("localhost:5173".to_string()),
            ..Overrides::default()
        };
        assert!(effective_config(None, &overrides).is_err());
    }

    #[test]
    fn test_effective_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskprobe.yaml");
        std::fs::write(&path, "base_url: http://nas.local\ntolerance_px: 2\n").unwrap();
        let overrides = Overrides {
            tolerance: Some(4),
            ..Overrides::default()
        };

        let config = effective_config(Some(&path), &overrides).unwrap();

        assert_eq!(config.base_url, "http://nas.local");
        assert_eq!(config.tolerance_px, 4);
    }
}
