//! Assertion primitives.
//!
//! Every primitive answers with a [`CheckOutcome`]; "not found" and "not as
//! expected" are outcomes, not errors. Only driver failures propagate.

pub mod region;

use crate::config::{HarnessConfig, WindowSize};
use crate::driver::{PageDriver, Viewport};
use crate::locator::{BoundingBox, Locator, Occurrence, Point};
use crate::result::HarnessResult;
use crate::wait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use region::{region_menu_check, MenuGuard, ProbeTarget, RegionProbe};

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Whether the check held
    pub passed: bool,
    /// What was observed
    pub detail: String,
}

impl CheckOutcome {
    /// Create a passing outcome
    #[must_use]
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    /// Create a failing outcome
    #[must_use]
    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }

    /// Pass or fail on a condition with the same detail
    #[must_use]
    pub fn from_bool(passed: bool, detail: impl Into<String>) -> Self {
        Self {
            passed,
            detail: detail.into(),
        }
    }
}

/// Expected number of matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Count {
    /// At least n matches
    AtLeast(usize),
    /// Exactly n matches
    Exactly(usize),
    /// No match at all
    None,
}

impl Count {
    /// Whether an observed count satisfies the expectation
    #[must_use]
    pub const fn accepts(&self, actual: usize) -> bool {
        match self {
            Self::AtLeast(n) => actual >= *n,
            Self::Exactly(n) => actual == *n,
            Self::None => actual == 0,
        }
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(n) => write!(f, "at least {n}"),
            Self::Exactly(n) => write!(f, "exactly {n}"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Where a fixed-size window should sit when centered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedGeometry {
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// Allowed deviation per axis in pixels
    pub tolerance_px: u32,
}

impl ExpectedGeometry {
    /// Create the expectation for a viewport and window size
    #[must_use]
    pub const fn new(viewport: Viewport, window: WindowSize, tolerance_px: u32) -> Self {
        Self {
            viewport_width: viewport.width,
            viewport_height: viewport.height,
            window_width: window.width,
            window_height: window.height,
            tolerance_px,
        }
    }

    /// Expectation described by configuration
    #[must_use]
    pub const fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.viewport, config.window, config.tolerance_px)
    }

    /// Top-left corner of a centered window
    #[must_use]
    pub fn expected_origin(&self) -> Point {
        Point::new(
            (f64::from(self.viewport_width) - f64::from(self.window_width)) / 2.0,
            (f64::from(self.viewport_height) - f64::from(self.window_height)) / 2.0,
        )
    }
}

/// Strictly inside the tolerance, or no deviation at all
fn within(delta: f64, tolerance_px: u32) -> bool {
    delta == 0.0 || delta < f64::from(tolerance_px)
}

/// Compare a rendered box against the centered position
///
/// Passes iff both axes deviate by less than the tolerance. An exact match
/// passes at any tolerance, including 0.
#[must_use]
pub fn bounding_box_within(actual: &BoundingBox, expected: &ExpectedGeometry) -> CheckOutcome {
    let origin = expected.expected_origin();
    let dx = (actual.x - origin.x).abs();
    let dy = (actual.y - origin.y).abs();
    let passed = within(dx, expected.tolerance_px) && within(dy, expected.tolerance_px);
    CheckOutcome::from_bool(
        passed,
        format!(
            "window at ({}, {}), expected ({}, {}) ±{}px, off by ({dx}, {dy})",
            actual.x, actual.y, origin.x, origin.y, expected.tolerance_px
        ),
    )
}

/// The located element exists, has area and is not hidden
pub async fn is_visible<P: PageDriver + ?Sized>(
    page: &P,
    locator: &Locator,
) -> HarnessResult<CheckOutcome> {
    let matches = page.query(locator).await?;
    Ok(match locator.resolve(&matches) {
        Ok(element) if element.visible => CheckOutcome::pass(format!("{locator} is visible")),
        Ok(_) => CheckOutcome::fail(format!("{locator} is present but not visible")),
        Err(reason) => CheckOutcome::fail(reason),
    })
}

/// An element containing `text` is visible at the given occurrence
///
/// With a `scope`, only descendants of the scope's elements are searched;
/// without one, the whole page.
pub async fn contains_text<P: PageDriver + ?Sized>(
    page: &P,
    scope: Option<&Locator>,
    text: &str,
    occurrence: Occurrence,
) -> HarnessResult<CheckOutcome> {
    let locator = Locator::by_text(text).occurrence(occurrence);
    let locator = match scope {
        Some(scope) => locator.within(scope.clone()),
        None => locator,
    };
    is_visible(page, &locator).await
}

/// Number of matches satisfies the expectation
pub async fn exists<P: PageDriver + ?Sized>(
    page: &P,
    locator: &Locator,
    expected: Count,
) -> HarnessResult<CheckOutcome> {
    let actual = page.query(locator).await?.len();
    Ok(CheckOutcome::from_bool(
        expected.accepts(actual),
        format!("{locator}: {actual} match(es), expected {expected}"),
    ))
}

/// The located window sits at the centered position
pub async fn window_centered<P: PageDriver + ?Sized>(
    page: &P,
    locator: &Locator,
    expected: &ExpectedGeometry,
) -> HarnessResult<CheckOutcome> {
    let matches = page.query(locator).await?;
    Ok(match locator.resolve(&matches) {
        Ok(element) => match element.bounding_box {
            Some(bbox) if element.visible => bounding_box_within(&bbox, expected),
            _ => CheckOutcome::fail(format!("{locator} has no rendered box")),
        },
        Err(reason) => CheckOutcome::fail(reason),
    })
}

/// The page is not on `path`, e.g. the login route
pub async fn path_is_not<P: PageDriver + ?Sized>(
    page: &P,
    path: &str,
) -> HarnessResult<CheckOutcome> {
    let current = wait::current_path(page).await?;
    Ok(CheckOutcome::from_bool(
        current != path,
        format!("current path {current}, must not be {path}"),
    ))
}
