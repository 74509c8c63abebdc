//! Navigation and readiness gate
//!
//! A scenario never asserts against a page that has not reached a known
//! structural state. [`goto`] commits a navigation, [`await_ready`] polls the
//! DOM until a [`ReadyCondition`] holds or its budget runs out.

use crate::config::{Timeouts, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READY_TIMEOUT_MS};
use crate::driver::PageDriver;
use crate::locator::{BoundingBox, ElementInfo, Locator, Occurrence};
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

// =============================================================================
// READY CONDITION
// =============================================================================

/// Structural predicate a page must satisfy before assertions run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum ReadyCondition {
    /// Some element with this role and accessible name is visible
    RoleVisible {
        /// ARIA role
        role: String,
        /// Accessible name
        name: String,
    },
    /// The element with this text at the given occurrence is visible
    TextVisible {
        /// Text to find
        text: String,
        /// Which match must be visible
        occurrence: Occurrence,
    },
    /// At least one element matches a CSS selector
    SelectorPresent {
        /// CSS selector
        css: String,
    },
}

impl ReadyCondition {
    /// Element with role and name is visible
    #[must_use]
    pub fn role_visible(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::RoleVisible {
            role: role.into(),
            name: name.into(),
        }
    }

    /// First element containing text is visible
    #[must_use]
    pub fn text_visible(text: impl Into<String>) -> Self {
        Self::text_visible_at(text, Occurrence::First)
    }

    /// Element containing text at an occurrence is visible
    #[must_use]
    pub fn text_visible_at(text: impl Into<String>, occurrence: Occurrence) -> Self {
        Self::TextVisible {
            text: text.into(),
            occurrence,
        }
    }

    /// Selector matches something
    #[must_use]
    pub fn selector_present(css: impl Into<String>) -> Self {
        Self::SelectorPresent { css: css.into() }
    }

    /// Locator probed on every poll
    #[must_use]
    pub fn locator(&self) -> Locator {
        match self {
            Self::RoleVisible { role, name } => Locator::by_role(role, name),
            Self::TextVisible { text, occurrence } => {
                Locator::by_text(text).occurrence(*occurrence)
            }
            Self::SelectorPresent { css } => Locator::new(css),
        }
    }

    /// Evaluate the predicate against one probe result
    #[must_use]
    pub fn holds(&self, matches: &[ElementInfo]) -> bool {
        match self {
            Self::RoleVisible { .. } => matches.iter().any(|m| m.visible),
            Self::TextVisible { occurrence, .. } => {
                occurrence.pick(matches).is_some_and(|m| m.visible)
            }
            Self::SelectorPresent { .. } => !matches.is_empty(),
        }
    }
}

impl fmt::Display for ReadyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoleVisible { role, name } => write!(f, "{role} {name:?} visible"),
            Self::TextVisible { text, occurrence } => {
                write!(f, "text {text:?} ({occurrence}) visible")
            }
            Self::SelectorPresent { css } => write!(f, "selector {css:?} present"),
        }
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for readiness waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl From<&Timeouts> for WaitOptions {
    fn from(timeouts: &Timeouts) -> Self {
        Self {
            timeout_ms: timeouts.ready_ms,
            poll_interval_ms: timeouts.poll_ms,
        }
    }
}

impl WaitOptions {
    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Result of a successful wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// A URL plus the condition proving it rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    /// Absolute URL
    pub url: String,
    /// Readiness condition
    pub condition: ReadyCondition,
    /// Readiness budget
    pub timeout: Duration,
}

impl NavigationTarget {
    /// Create a target
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero timeout
    pub fn new(
        url: impl Into<String>,
        condition: ReadyCondition,
        timeout: Duration,
    ) -> HarnessResult<Self> {
        if timeout.is_zero() {
            return Err(HarnessError::config("readiness timeout must be > 0"));
        }
        Ok(Self {
            url: url.into(),
            condition,
            timeout,
        })
    }
}

/// Path component of an absolute URL
#[must_use]
pub fn url_path(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = rest.find('/').map_or("/", |i| &rest[i..]);
    path.split(|c: char| c == '?' || c == '#').next().unwrap_or("/")
}

/// Navigate and return once the navigation is committed
pub async fn goto<P: PageDriver + ?Sized>(page: &P, url: &str) -> HarnessResult<()> {
    debug!(url, "navigating");
    page.navigate(url).await
}

/// Poll until the condition holds or the timeout elapses
///
/// Each probe is bounded by the remaining budget, so a hung driver call
/// cannot stretch the wait. A probe that raced a navigation
/// ([`HarnessError::DocumentReplaced`]) counts as "not yet".
///
/// # Errors
///
/// Returns [`HarnessError::ReadinessTimeout`] when the budget runs out, or
/// the probe's error when it is not transient (closed or crashed context)
pub async fn await_ready<P: PageDriver + ?Sized>(
    page: &P,
    condition: &ReadyCondition,
    options: &WaitOptions,
) -> HarnessResult<WaitResult> {
    let description = condition.to_string();
    let ((), elapsed) = poll(page, &condition.locator(), &description, options, |matches| {
        condition.holds(matches).then_some(())
    })
    .await?;
    Ok(WaitResult {
        elapsed,
        waited_for: description,
    })
}

/// Poll until the located element is visible and return its box
///
/// Same budget rules as [`await_ready`].
pub async fn await_visible<P: PageDriver + ?Sized>(
    page: &P,
    locator: &Locator,
    options: &WaitOptions,
) -> HarnessResult<BoundingBox> {
    let description = format!("{locator} visible");
    let (bbox, _) = poll(page, locator, &description, options, |matches| {
        locator
            .resolve(matches)
            .ok()
            .filter(|el| el.visible)
            .and_then(|el| el.bounding_box)
    })
    .await?;
    Ok(bbox)
}

async fn poll<P, T, F>(
    page: &P,
    locator: &Locator,
    description: &str,
    options: &WaitOptions,
    check: F,
) -> HarnessResult<(T, Duration)>
where
    P: PageDriver + ?Sized,
    F: Fn(&[ElementInfo]) -> Option<T>,
{
    let start = Instant::now();
    let deadline = start + options.timeout();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, page.query(locator)).await {
            Ok(Ok(matches)) => {
                if let Some(found) = check(&matches) {
                    let elapsed = start.elapsed();
                    debug!(condition = description, ?elapsed, "ready");
                    return Ok((found, elapsed));
                }
            }
            Ok(Err(e)) if e.is_transient() => {
                debug!(condition = description, error = %e, "document replaced, retrying");
            }
            Ok(Err(e)) => {
                warn!(condition = description, error = %e, "readiness probe failed");
                return Err(e);
            }
            Err(_) => break,
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(options.poll_interval().min(remaining)).await;
    }

    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    warn!(condition = description, elapsed_ms, "readiness timeout");
    Err(HarnessError::ReadinessTimeout {
        condition: description.to_string(),
        elapsed_ms,
    })
}

/// Navigate to a target and wait for its readiness condition
pub async fn open<P: PageDriver + ?Sized>(
    page: &P,
    target: &NavigationTarget,
    poll_interval_ms: u64,
) -> HarnessResult<WaitResult> {
    goto(page, &target.url).await?;
    let timeout_ms = u64::try_from(target.timeout.as_millis()).unwrap_or(u64::MAX);
    let options = WaitOptions::default()
        .with_timeout(timeout_ms)
        .with_poll_interval(poll_interval_ms);
    await_ready(page, &target.condition, &options).await
}

/// Path of the page's current document
pub async fn current_path<P: PageDriver + ?Sized>(page: &P) -> HarnessResult<String> {
    let url = page.current_url().await?;
    Ok(url_path(&url).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::{MockApp, MockDriver, StorageEntries, Viewport};
    use crate::locator::Selector;

    const DESKTOP: &str = "http://localhost:5173/desktop";

    async fn seeded(app: MockApp) -> MockDriver {
        let page = MockDriver::new(app, Viewport::default());
        let mut entries = StorageEntries::new();
        entries.insert("auth_token".to_string(), "mock-token".to_string());
        page.install_storage_seed(&entries).await.unwrap();
        page
    }

    fn options(timeout_ms: u64) -> WaitOptions {
        WaitOptions::default().with_timeout(timeout_ms)
    }

    mod condition_tests {
        use super::*;

        #[test]
        fn test_role_visible_any_match() {
            let cond = ReadyCondition::role_visible("button", "CPU");
            let hidden = ElementInfo::hidden();
            let shown = ElementInfo::visible(BoundingBox::new(0.0, 0.0, 10.0, 10.0));
            assert!(!cond.holds(&[hidden.clone()]));
            assert!(cond.holds(&[hidden, shown]));
        }

        #[test]
        fn test_text_visible_respects_occurrence() {
            let shown = ElementInfo::visible(BoundingBox::new(0.0, 0.0, 10.0, 10.0));
            let cond = ReadyCondition::text_visible_at("Activity Monitor", Occurrence::Nth(1));
            assert!(!cond.holds(&[shown.clone()]));
            assert!(cond.holds(&[ElementInfo::hidden(), shown]));
        }

        #[test]
        fn test_selector_present_ignores_visibility() {
            let cond = ReadyCondition::selector_present(".desktop-window");
            assert!(cond.holds(&[ElementInfo::hidden()]));
            assert!(!cond.holds(&[]));
        }

        #[test]
        fn test_display() {
            assert_eq!(
                ReadyCondition::text_visible("Mynt NAS").to_string(),
                "text \"Mynt NAS\" (first) visible"
            );
            assert_eq!(
                ReadyCondition::selector_present(".desktop-icon").to_string(),
                "selector \".desktop-icon\" present"
            );
        }

        #[test]
        fn test_zero_timeout_target_rejected() {
            let err = NavigationTarget::new(
                DESKTOP,
                ReadyCondition::text_visible("Mynt NAS"),
                Duration::ZERO,
            )
            .unwrap_err();
            assert_eq!(err.kind(), "config");
        }

        #[test]
        fn test_url_path() {
            assert_eq!(url_path(DESKTOP), "/desktop");
            assert_eq!(url_path("http://localhost:5173"), "/");
            assert_eq!(url_path("https://nas.local/login#top"), "/login");
        }
    }

    mod gate_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_ready_after_seeded_navigation() {
            let page = seeded(MockApp::desktop()).await;
            goto(&page, DESKTOP).await.unwrap();
            let result = await_ready(&page, &ReadyCondition::text_visible("Mynt NAS"), &options(10_000))
                .await
                .unwrap();
            assert!(result.elapsed < Duration::from_millis(100));
            assert_eq!(current_path(&page).await.unwrap(), "/desktop");
        }

        #[tokio::test(start_paused = true)]
        async fn test_never_true_condition_times_out_on_budget() {
            let page = seeded(MockApp::desktop()).await;
            goto(&page, DESKTOP).await.unwrap();
            let start = Instant::now();
            let err = await_ready(
                &page,
                &ReadyCondition::text_visible("Does Not Exist"),
                &options(10_000),
            )
            .await
            .unwrap_err();
            let waited = start.elapsed();
            assert!(waited >= Duration::from_millis(10_000));
            assert!(waited <= Duration::from_millis(10_500));
            match err {
                HarnessError::ReadinessTimeout {
                    condition,
                    elapsed_ms,
                } => {
                    assert!(condition.contains("Does Not Exist"));
                    assert!((10_000..=10_500).contains(&elapsed_ms));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_hung_probe_is_bounded_by_budget() {
            let app = MockApp::desktop().with_query_delay(Duration::from_secs(60));
            let page = seeded(app).await;
            goto(&page, DESKTOP).await.unwrap();
            let start = Instant::now();
            let err = await_ready(&page, &ReadyCondition::text_visible("Mynt NAS"), &options(1_000))
                .await
                .unwrap_err();
            assert!(err.is_timeout());
            assert!(start.elapsed() <= Duration::from_millis(1_500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_driver_error_ends_wait_immediately() {
            let app = MockApp::desktop().with_failing_selector(Selector::css(".desktop-menubar"));
            let page = seeded(app).await;
            goto(&page, DESKTOP).await.unwrap();
            let start = Instant::now();
            let err = await_ready(
                &page,
                &ReadyCondition::selector_present(".desktop-menubar"),
                &options(10_000),
            )
            .await
            .unwrap_err();
            assert_eq!(err.kind(), "driver");
            assert!(start.elapsed() < Duration::from_millis(100));
        }

        #[tokio::test(start_paused = true)]
        async fn test_closed_page_is_driver_error() {
            let page = seeded(MockApp::desktop()).await;
            goto(&page, DESKTOP).await.unwrap();
            page.close().await.unwrap();
            let start = Instant::now();
            let err = await_ready(
                &page,
                &ReadyCondition::selector_present(".desktop-menubar"),
                &options(10_000),
            )
            .await
            .unwrap_err();
            assert_eq!(err.kind(), "driver");
            assert!(start.elapsed() < Duration::from_millis(100));
        }

        #[tokio::test(start_paused = true)]
        async fn test_replaced_document_is_retried() {
            let page = seeded(MockApp::desktop().with_replaced_documents(3)).await;
            goto(&page, DESKTOP).await.unwrap();
            let result = await_ready(
                &page,
                &ReadyCondition::selector_present(".desktop-menubar"),
                &WaitOptions::default().with_poll_interval(50),
            )
            .await
            .unwrap();
            assert!(result.elapsed >= Duration::from_millis(150));
            assert!(result.elapsed < Duration::from_millis(1_000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_unseeded_open_lands_on_login_and_times_out() {
            let page = MockDriver::new(MockApp::desktop(), Viewport::default());
            let target = NavigationTarget::new(
                DESKTOP,
                ReadyCondition::text_visible("Mynt NAS"),
                Duration::from_secs(2),
            )
            .unwrap();
            let err = open(&page, &target, 50).await.unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(current_path(&page).await.unwrap(), "/login");
        }

        #[tokio::test(start_paused = true)]
        async fn test_await_visible_returns_box() {
            let page = seeded(MockApp::desktop()).await;
            goto(&page, DESKTOP).await.unwrap();
            let locator = Locator::by_role("button", "Settings").first();
            let bbox = await_visible(&page, &locator, &options(1_000)).await.unwrap();
            assert_eq!(bbox, BoundingBox::new(24.0, 144.0, 80.0, 80.0));
        }

        #[tokio::test(start_paused = true)]
        async fn test_await_visible_hidden_times_out() {
            let page = seeded(MockApp::desktop()).await;
            goto(&page, DESKTOP).await.unwrap();
            let err = await_visible(&page, &Locator::new(".context-menu"), &options(300))
                .await
                .unwrap_err();
            assert!(err.to_string().contains(".context-menu"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_open_waits_for_selector() {
            let page = seeded(MockApp::desktop()).await;
            let target = NavigationTarget::new(
                DESKTOP,
                ReadyCondition::selector_present(".desktop-icon"),
                Duration::from_secs(10),
            )
            .unwrap();
            let result = open(&page, &target, 50).await.unwrap();
            assert!(result.waited_for.contains(".desktop-icon"));
        }
    }
}
