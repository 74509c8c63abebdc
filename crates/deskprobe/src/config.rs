//! Harness configuration
//!
//! Every URL, timeout, coordinate and selector the scenarios depend on lives
//! here. Values load from YAML and are overridden by the CLI.

use crate::browser::BrowserConfig;
use crate::driver::Viewport;
use crate::locator::{Locator, Point};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the application under test
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

/// Default readiness timeout (10 seconds)
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;

/// Default post-interaction settle delay (1 second)
pub const DEFAULT_SETTLE_MS: u64 = 1_000;

/// Default polling interval for readiness waits (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default geometric tolerance in pixels
pub const DEFAULT_TOLERANCE_PX: u32 = 5;

/// Timing budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Readiness wait budget
    pub ready_ms: u64,
    /// Pause after interactions
    pub settle_ms: u64,
    /// Readiness polling interval
    pub poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ready_ms: DEFAULT_READY_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            poll_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Timeouts {
    /// Readiness budget as Duration
    #[must_use]
    pub const fn ready(&self) -> Duration {
        Duration::from_millis(self.ready_ms)
    }

    /// Settle delay as Duration
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Poll interval as Duration
    #[must_use]
    pub const fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

/// Session values injected before the application loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Value stored under `auth_token`
    pub token: String,
    /// `username` field of the stored user
    pub username: String,
    /// Additional user fields, e.g. the admin/role indicator
    pub user_fields: BTreeMap<String, serde_json::Value>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut user_fields = BTreeMap::new();
        user_fields.insert("is_admin".to_string(), serde_json::Value::Bool(true));
        user_fields.insert(
            "role".to_string(),
            serde_json::Value::String("admin".to_string()),
        );
        Self {
            token: String::from("mock-token"),
            username: String::from("admin"),
            user_fields,
        }
    }
}

/// DOM markers of the desktop UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Route of the desktop
    pub desktop_path: String,
    /// Route the app redirects unauthenticated users to
    pub login_path: String,
    /// Text proving the desktop shell rendered
    pub desktop_ready_text: String,
    /// Menu bar
    pub menu_bar: String,
    /// Dock
    pub dock: String,
    /// Desktop icon buttons
    pub icon: String,
    /// Window chrome
    pub window: String,
    /// Context-menu root
    pub context_menu: Locator,
    /// App opened by the activity scenario
    pub activity_app: String,
    /// App opened by the centering scenario
    pub centering_app: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            desktop_path: String::from("/desktop"),
            login_path: String::from("/login"),
            desktop_ready_text: String::from("Mynt NAS"),
            menu_bar: String::from(".desktop-menubar"),
            dock: String::from(".desktop-dock"),
            icon: String::from(".desktop-icon"),
            window: String::from(".desktop-window"),
            context_menu: Locator::by_text("Change Wallpaper"),
            activity_app: String::from("Activity Monitor"),
            centering_app: String::from("Settings"),
        }
    }
}

/// Fixed size of an application window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the application
    pub base_url: String,
    /// Emulated viewport
    pub viewport: Viewport,
    /// Timing budget
    pub timeouts: Timeouts,
    /// Geometric tolerance in pixels
    pub tolerance_px: u32,
    /// Directory for screenshots
    pub artifact_dir: PathBuf,
    /// Injected session
    pub session: SessionConfig,
    /// DOM markers
    pub markers: Markers,
    /// Known size of application windows
    pub window: WindowSize,
    /// Empty desktop spot right-clicked to open the context menu
    pub background_point: Point,
    /// Empty desktop spot clicked to dismiss the menu, clear of where it opens
    pub dismiss_point: Point,
    /// Browser launch options
    pub browser: BrowserConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            viewport: Viewport::default(),
            timeouts: Timeouts::default(),
            tolerance_px: DEFAULT_TOLERANCE_PX,
            artifact_dir: PathBuf::from("verification"),
            session: SessionConfig::default(),
            markers: Markers::default(),
            window: WindowSize::default(),
            background_point: Point::new(500.0, 500.0),
            dismiss_point: Point::new(900.0, 300.0),
            browser: BrowserConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file
    ///
    /// Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(text: &str) -> HarnessResult<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport::new(width, height);
        self
    }

    /// Set readiness timeout
    #[must_use]
    pub const fn with_ready_timeout(mut self, ms: u64) -> Self {
        self.timeouts.ready_ms = ms;
        self
    }

    /// Set settle delay
    #[must_use]
    pub const fn with_settle(mut self, ms: u64) -> Self {
        self.timeouts.settle_ms = ms;
        self
    }

    /// Set geometric tolerance
    #[must_use]
    pub const fn with_tolerance(mut self, px: u32) -> Self {
        self.tolerance_px = px;
        self
    }

    /// Set artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Absolute URL for a route of the application
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Reject values no scenario can run with
    pub fn validate(&self) -> HarnessResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(HarnessError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(HarnessError::config("viewport must be non-empty"));
        }
        if self.timeouts.ready_ms == 0 {
            return Err(HarnessError::config("timeouts.ready_ms must be > 0"));
        }
        if self.timeouts.poll_ms == 0 {
            return Err(HarnessError::config("timeouts.poll_ms must be > 0"));
        }
        for (key, point) in [
            ("background_point", self.background_point),
            ("dismiss_point", self.dismiss_point),
        ] {
            let inside = point.x >= 0.0
                && point.y >= 0.0
                && point.x < f64::from(self.viewport.width)
                && point.y < f64::from(self.viewport.height);
            if !inside {
                return Err(HarnessError::config(format!(
                    "{key} {point} lies outside the viewport"
                )));
            }
        }
        if self.window.width > self.viewport.width || self.window.height > self.viewport.height {
            return Err(HarnessError::config(format!(
                "window {}x{} does not fit viewport {}x{}",
                self.window.width, self.window.height, self.viewport.width, self.viewport.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod default_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = HarnessConfig::default();
            assert_eq!(config.base_url, "http://localhost:5173");
            assert_eq!(config.viewport, Viewport::new(1280, 800));
            assert_eq!(config.timeouts.ready_ms, 10_000);
            assert_eq!(config.timeouts.settle_ms, 1_000);
            assert_eq!(config.tolerance_px, 5);
            assert_eq!(config.window, WindowSize::default());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_default_session_carries_admin_indicators() {
            let session = SessionConfig::default();
            assert_eq!(session.username, "admin");
            assert_eq!(session.user_fields["is_admin"], serde_json::json!(true));
            assert_eq!(session.user_fields["role"], serde_json::json!("admin"));
        }
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_builder_chain() {
            let config = HarnessConfig::new()
                .with_base_url("https://nas.local/")
                .with_viewport(1920, 1080)
                .with_ready_timeout(2_000)
                .with_settle(0)
                .with_tolerance(2)
                .with_artifact_dir("out");
            assert_eq!(config.url("/desktop"), "https://nas.local/desktop");
            assert_eq!(config.url("login"), "https://nas.local/login");
            assert_eq!(config.timeouts.ready(), Duration::from_secs(2));
            assert_eq!(config.timeouts.settle(), Duration::ZERO);
            assert_eq!(config.tolerance_px, 2);
            assert_eq!(config.artifact_dir, PathBuf::from("out"));
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = HarnessConfig::from_yaml_str(
                "base_url: http://10.0.0.2:8080\ntimeouts:\n  ready_ms: 3000\n",
            )
            .unwrap();
            assert_eq!(config.base_url, "http://10.0.0.2:8080");
            assert_eq!(config.timeouts.ready_ms, 3000);
            assert_eq!(config.timeouts.settle_ms, DEFAULT_SETTLE_MS);
            assert_eq!(config.markers.menu_bar, ".desktop-menubar");
        }

        #[test]
        fn test_yaml_overrides_user_fields() {
            let config = HarnessConfig::from_yaml_str(
                "session:\n  token: t\n  username: root\n  user_fields:\n    isAdmin: true\n    accountType: system\n",
            )
            .unwrap();
            assert_eq!(config.session.user_fields.len(), 2);
            assert_eq!(
                config.session.user_fields["accountType"],
                serde_json::json!("system")
            );
        }

        #[test]
        fn test_invalid_yaml_is_rejected() {
            let err = HarnessConfig::from_yaml_str("viewport: [1, 2").unwrap_err();
            assert_eq!(err.kind(), "yaml");
        }

        #[test]
        fn test_round_trip_through_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("deskprobe.yaml");
            let config = HarnessConfig::default().with_tolerance(9);
            std::fs::write(&path, serde_yaml_ng::to_string(&config).unwrap()).unwrap();
            let loaded = HarnessConfig::from_yaml_file(&path).unwrap();
            assert_eq!(loaded, config);
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_rejects_non_http_base() {
            let err = HarnessConfig::new()
                .with_base_url("localhost:5173")
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("base_url"));
        }

        #[test]
        fn test_rejects_zero_timeout() {
            assert!(HarnessConfig::new()
                .with_ready_timeout(0)
                .validate()
                .is_err());
        }

        #[test]
        fn test_rejects_window_larger_than_viewport() {
            let err = HarnessConfig::new()
                .with_viewport(1280, 560)
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("does not fit"));
        }

        #[test]
        fn test_dismiss_point_is_separate_and_inside_viewport() {
            let config = HarnessConfig::new();
            assert_ne!(config.dismiss_point, config.background_point);

            let mut config = HarnessConfig::new();
            config.dismiss_point = Point::new(1300.0, 10.0);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("dismiss_point"));
        }
    }
}
