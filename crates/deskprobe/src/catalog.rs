//! Built-in scenarios for the NAS desktop.

use crate::assertion::{ProbeTarget, RegionProbe};
use crate::config::HarnessConfig;
use crate::locator::{Locator, Occurrence};
use crate::scenario::{ScenarioDefinition, Step};
use crate::wait::ReadyCondition;

/// Names of the built-in scenarios, in run order
pub const SCENARIO_NAMES: [&str; 3] = ["activity-monitor", "context-menu", "window-centering"];

fn open_desktop(definition: ScenarioDefinition, config: &HarnessConfig) -> ScenarioDefinition {
    definition
        .step(Step::Navigate {
            path: config.markers.desktop_path.clone(),
        })
        .step(Step::AssertNotRedirected {
            name: "session bypasses login".to_string(),
        })
}

/// Open the activity monitor from its desktop icon and check its contents
#[must_use]
pub fn activity_monitor(config: &HarnessConfig) -> ScenarioDefinition {
    let m = &config.markers;
    let window = Locator::new(&m.window).first();
    let text = |name: &str, text: &str| Step::AssertText {
        name: name.to_string(),
        within: Some(window.clone()),
        text: text.to_string(),
        occurrence: Occurrence::First,
    };
    let button = |name: &str| Step::AssertVisible {
        name: format!("{name} tab"),
        target: Locator::by_role("button", name),
    };

    open_desktop(
        ScenarioDefinition::new(
            SCENARIO_NAMES[0],
            "opens the activity monitor and shows its tabs and process columns",
        ),
        config,
    )
    .step(Step::AwaitReady(ReadyCondition::text_visible(
        &m.desktop_ready_text,
    )))
    .step(Step::Click(
        Locator::by_role("button", &m.activity_app).first(),
    ))
    .step(Step::AwaitReady(ReadyCondition::text_visible_at(
        &m.activity_app,
        Occurrence::Nth(1),
    )))
    .step(text("window title", &m.activity_app))
    .step(button("CPU"))
    .step(button("Memory"))
    .step(text("process name column", "Process Name"))
    .step(text("cpu column", "% CPU"))
    .step(Step::Settle)
    .step(Step::Checkpoint("activity_monitor".to_string()))
}

/// Right-click each desktop region; only the background opens the menu
#[must_use]
pub fn context_menu(config: &HarnessConfig) -> ScenarioDefinition {
    let m = &config.markers;
    let background = RegionProbe::opens_menu("background", ProbeTarget::Point(config.background_point));
    let regions = vec![
        RegionProbe::no_menu("menu bar", ProbeTarget::Locator(Locator::new(&m.menu_bar))),
        RegionProbe::no_menu(
            "desktop icon",
            ProbeTarget::Locator(Locator::new(&m.icon).first()),
        ),
        RegionProbe::no_menu("dock", ProbeTarget::Locator(Locator::new(&m.dock))),
    ];

    open_desktop(
        ScenarioDefinition::new(
            SCENARIO_NAMES[1],
            "context menu opens on the background only",
        ),
        config,
    )
    .step(Step::AwaitReady(ReadyCondition::selector_present(&m.menu_bar)))
    .step(Step::ProbeRegions(vec![background]))
    .step(Step::Checkpoint("desktop_context_menu".to_string()))
    .step(Step::ProbeRegions(regions))
    .step(Step::Checkpoint("no_context_menu".to_string()))
}

/// Open an app window and check it is centered in the viewport
#[must_use]
pub fn window_centering(config: &HarnessConfig) -> ScenarioDefinition {
    let m = &config.markers;
    let window = Locator::new(&m.window).with_text(&m.centering_app).first();

    open_desktop(
        ScenarioDefinition::new(
            SCENARIO_NAMES[2],
            "a newly opened window is centered in the viewport",
        ),
        config,
    )
    .step(Step::AwaitReady(ReadyCondition::selector_present(&m.icon)))
    .step(Step::Click(
        Locator::new(&m.icon).with_text(&m.centering_app).first(),
    ))
    .step(Step::AwaitReady(ReadyCondition::selector_present(&m.window)))
    .step(Step::Settle)
    .step(Step::Checkpoint("window_centering".to_string()))
    .step(Step::AssertCentered {
        name: format!("{} window centered", m.centering_app),
        target: window,
    })
}

/// Every built-in scenario
#[must_use]
pub fn all(config: &HarnessConfig) -> Vec<ScenarioDefinition> {
    vec![
        activity_monitor(config),
        context_menu(config),
        window_centering(config),
    ]
}

/// Look up a built-in scenario by name
#[must_use]
pub fn by_name(config: &HarnessConfig, name: &str) -> Option<ScenarioDefinition> {
    all(config).into_iter().find(|s| s.name == name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockApp, MockPool};
    use crate::locator::BoundingBox;
    use crate::reporter::MemorySink;
    use crate::scenario::Harness;

    fn harness(app: MockApp, dir: &std::path::Path) -> Harness<MockPool> {
        Harness::new(
            MockPool::new(app),
            HarnessConfig::default().with_artifact_dir(dir),
        )
        .unwrap()
    }

    #[test]
    fn test_names_match_definitions() {
        let config = HarnessConfig::default();
        let names: Vec<String> = all(&config).into_iter().map(|s| s.name).collect();
        assert_eq!(names, SCENARIO_NAMES);
        assert!(by_name(&config, "context-menu").is_some());
        assert!(by_name(&config, "nope").is_none());
    }

    #[test]
    fn test_markers_flow_into_steps() {
        let mut config = HarnessConfig::default();
        config.markers.desktop_path = "/home".to_string();
        let scenario = activity_monitor(&config);
        assert_eq!(
            scenario.steps[0],
            Step::Navigate {
                path: "/home".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_builtins_pass_on_desktop() {
        let dir = tempfile::tempdir().unwrap();
        let harness = harness(MockApp::desktop(), dir.path());
        let mut sink = MemorySink::new();

        let report = harness.run_all(&all(harness.config()), &mut sink).await;

        for result in &report.results {
            assert!(result.passed(), "{}: {:?}", result.scenario, result.failures());
        }
        for shot in [
            "activity_monitor.png",
            "desktop_context_menu.png",
            "no_context_menu.png",
            "window_centering.png",
        ] {
            assert!(dir.path().join(shot).exists(), "{shot}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_menu_records_four_regions() {
        let dir = tempfile::tempdir().unwrap();
        let harness = harness(MockApp::desktop(), dir.path());
        let mut sink = MemorySink::new();

        let result = harness
            .run(&context_menu(harness.config()), &mut sink)
            .await
            .unwrap();

        let regions: Vec<&str> = result
            .checks
            .iter()
            .filter_map(|c| c.name.strip_prefix("context menu: "))
            .collect();
        assert_eq!(regions, vec!["background", "menu bar", "desktop icon", "dock"]);
        assert!(result
            .check("context menu: menu bar")
            .unwrap()
            .detail
            .contains("no menu open before click"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_center_window_is_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let app = MockApp::desktop()
            .with_box("window-settings", BoundingBox::new(260.0, 100.0, 800.0, 600.0));
        let harness = harness(app, dir.path());
        let mut sink = MemorySink::new();

        let result = harness
            .run(&window_centering(harness.config()), &mut sink)
            .await
            .unwrap();

        assert!(!result.passed());
        assert!(result.error.is_none());
        assert!(!result.check("Settings window centered").unwrap().passed);
        assert!(dir.path().join("window_centering.png").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_monitor_is_deterministic_without_backend() {
        for app in [MockApp::desktop(), MockApp::desktop().without_backend()] {
            let dir = tempfile::tempdir().unwrap();
            let harness = harness(app, dir.path());
            let mut sink = MemorySink::new();
            let scenarios = [activity_monitor(harness.config()), activity_monitor(harness.config())];

            let report = harness.run_all(&scenarios, &mut sink).await;

            assert_eq!(report.results[0].checks, report.results[1].checks);
            assert!(report.passed());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ready_text_aborts_activity_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let harness = harness(MockApp::desktop().without_element("menubar"), dir.path());
        let mut sink = MemorySink::new();

        let err = harness
            .run(&activity_monitor(harness.config()), &mut sink)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(dir.path().join("activity-monitor-error.png").exists());
    }
}
