//! Context-menu region probes.
//!
//! The desktop opens its context menu only on the empty background. Each
//! [`RegionProbe`] right-clicks one region and compares the menu's presence
//! with the expectation. The menu is dismissed after every probe, whatever
//! the outcome, so one probe never leaks an open menu into the next.

use super::CheckOutcome;
use crate::driver::{MouseButton, PageDriver};
use crate::locator::{Locator, Point};
use crate::result::HarnessResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Where a probe right-clicks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeTarget {
    /// Fixed viewport coordinate
    Point(Point),
    /// Center of a located element
    Locator(Locator),
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point(p) => write!(f, "{p}"),
            Self::Locator(l) => write!(f, "{l}"),
        }
    }
}

/// One row of the context-menu matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionProbe {
    /// Region name used in reports
    pub name: String,
    /// What to right-click
    pub target: ProbeTarget,
    /// Whether the menu must appear
    pub expected_menu_visible: bool,
}

impl RegionProbe {
    /// Probe expecting the menu to appear
    #[must_use]
    pub fn opens_menu(name: impl Into<String>, target: ProbeTarget) -> Self {
        Self {
            name: name.into(),
            target,
            expected_menu_visible: true,
        }
    }

    /// Probe expecting no menu
    #[must_use]
    pub fn no_menu(name: impl Into<String>, target: ProbeTarget) -> Self {
        Self {
            name: name.into(),
            target,
            expected_menu_visible: false,
        }
    }
}

/// Pending dismissal of a possibly open context menu
///
/// [`MenuGuard::release`] clicks the dismiss point and waits for the UI to
/// settle. Async cleanup cannot run in `Drop`, so a guard dropped without
/// release only logs a warning.
#[must_use = "the menu stays open unless the guard is released"]
#[derive(Debug)]
pub struct MenuGuard<'a, P: PageDriver + ?Sized> {
    page: &'a P,
    dismiss_at: Point,
    settle: Duration,
    released: bool,
}

impl<'a, P: PageDriver + ?Sized> MenuGuard<'a, P> {
    /// Arm a guard before opening a menu
    pub const fn arm(page: &'a P, dismiss_at: Point, settle: Duration) -> Self {
        Self {
            page,
            dismiss_at,
            settle,
            released: false,
        }
    }

    /// Dismiss the menu and wait for the UI to settle
    pub async fn release(mut self) -> HarnessResult<()> {
        self.released = true;
        self.page
            .click_at(self.dismiss_at, MouseButton::Primary)
            .await?;
        tokio::time::sleep(self.settle).await;
        debug!(at = %self.dismiss_at, "context menu dismissed");
        Ok(())
    }
}

impl<P: PageDriver + ?Sized> Drop for MenuGuard<'_, P> {
    fn drop(&mut self) {
        if !self.released {
            warn!(at = %self.dismiss_at, "menu guard dropped without dismissing the menu");
        }
    }
}

/// Whether any element of the menu is visible
async fn menu_visible<P: PageDriver + ?Sized>(page: &P, menu: &Locator) -> HarnessResult<bool> {
    Ok(page.query(menu).await?.iter().any(|m| m.visible))
}

/// Resolve a probe target to a click point
async fn target_point<P: PageDriver + ?Sized>(
    page: &P,
    target: &ProbeTarget,
) -> HarnessResult<Result<Point, String>> {
    Ok(match target {
        ProbeTarget::Point(p) => Ok(*p),
        ProbeTarget::Locator(locator) => {
            let matches = page.query(locator).await?;
            locator.resolve(&matches).and_then(|el| match el.bounding_box {
                Some(bbox) if el.visible => Ok(bbox.center()),
                _ => Err(format!("{locator} is not rendered")),
            })
        }
    })
}

/// Right-click one region and compare the menu's presence
///
/// Fails when a menu is already open before the click, since the result
/// would say nothing about the region. The dismiss click at `dismiss_at`
/// runs on every exit path, including driver errors and unresolvable
/// targets, and the probe fails if the menu survives it.
pub async fn region_menu_check<P: PageDriver + ?Sized>(
    page: &P,
    probe: &RegionProbe,
    menu: &Locator,
    dismiss_at: Point,
    settle: Duration,
) -> HarnessResult<CheckOutcome> {
    let guard = MenuGuard::arm(page, dismiss_at, settle);
    let checked = probe_region(page, probe, menu, settle).await;
    let released = guard.release().await;
    let outcome = checked?;
    released?;

    if menu_visible(page, menu).await? {
        warn!(region = %probe.name, at = %dismiss_at, "context menu survived dismissal");
        return Ok(CheckOutcome::fail(format!(
            "{}; menu still open after dismiss click at {dismiss_at}",
            outcome.detail
        )));
    }
    Ok(outcome)
}

async fn probe_region<P: PageDriver + ?Sized>(
    page: &P,
    probe: &RegionProbe,
    menu: &Locator,
    settle: Duration,
) -> HarnessResult<CheckOutcome> {
    if menu_visible(page, menu).await? {
        return Ok(CheckOutcome::fail(format!(
            "{}: menu already open before click",
            probe.name
        )));
    }

    let point = match target_point(page, &probe.target).await? {
        Ok(point) => point,
        Err(reason) => {
            return Ok(CheckOutcome::fail(format!(
                "{}: target not found ({reason})",
                probe.name
            )))
        }
    };

    page.click_at(point, MouseButton::Secondary).await?;
    tokio::time::sleep(settle).await;
    let shown = menu_visible(page, menu).await?;

    let describe = |visible: bool| if visible { "shown" } else { "hidden" };
    debug!(region = %probe.name, %point, shown, "region probed");
    Ok(CheckOutcome::from_bool(
        shown == probe.expected_menu_visible,
        format!(
            "{}: right-click at {point}, menu {} (expected {}); no menu open before click",
            probe.name,
            describe(shown),
            describe(probe.expected_menu_visible)
        ),
    ))
}
