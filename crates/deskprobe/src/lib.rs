//! Deskprobe: headless-browser verification for the NAS desktop UI
//!
//! Drives the desktop web UI through Chromium, skips its login by seeding
//! client-side session state before the first page script runs, and checks
//! structural and geometric properties of what it renders.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    DESKPROBE Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Session    │    │ Readiness  │    │ Assertion  │            │
//! │   │ Seed       │───►│ Gate       │───►│ Primitives │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             ▼                   │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ ResultSink │◄───│ Scenario   │◄───│ Catalog    │            │
//! │   │            │    │ Runner     │    │            │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           ▼                                     │
//! │                ContextPool / PageDriver                         │
//! │             (chromiumoxide or MockDriver)                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use deskprobe::{catalog, Harness, HarnessConfig, MemorySink, MockApp, MockPool};
//!
//! # async fn demo() -> deskprobe::HarnessResult<()> {
//! let config = HarnessConfig::default();
//! let harness = Harness::new(MockPool::new(MockApp::desktop()), config)?;
//! let mut sink = MemorySink::new();
//! let report = harness.run_all(&catalog::all(harness.config()), &mut sink).await;
//! assert!(report.passed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod assertion;
mod browser;
pub mod catalog;
mod config;
mod driver;
mod locator;
mod reporter;
mod result;
mod scenario;
pub mod session;
pub mod wait;

pub use assertion::{
    bounding_box_within, contains_text, exists, is_visible, path_is_not, region_menu_check,
    window_centered, CheckOutcome, Count, ExpectedGeometry, MenuGuard, ProbeTarget, RegionProbe,
};
#[cfg(feature = "browser")]
pub use browser::{Browser, Page};
pub use browser::BrowserConfig;
pub use config::{
    HarnessConfig, Markers, SessionConfig, Timeouts, WindowSize, DEFAULT_BASE_URL,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_READY_TIMEOUT_MS, DEFAULT_SETTLE_MS, DEFAULT_TOLERANCE_PX,
};
pub use driver::{
    ContextPool, MockApp, MockDriver, MockElement, MockPool, MouseButton, PageDriver,
    StorageEntries, Viewport,
};
pub use locator::{BoundingBox, ElementInfo, Locator, Occurrence, Point, Selector};
pub use reporter::{
    CheckRecord, Checkpoint, MemorySink, ResultSink, RunReport, ScenarioResult, SinkEvent,
};
pub use result::{HarnessError, HarnessResult};
pub use scenario::{Harness, ScenarioDefinition, ScenarioRunner, Step};
pub use session::SessionSeed;
pub use wait::{await_ready, await_visible, goto, open, NavigationTarget, ReadyCondition, WaitOptions};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        catalog, ContextPool, Count, Harness, HarnessConfig, HarnessError, HarnessResult, Locator,
        Occurrence, PageDriver, ReadyCondition, ResultSink, RunReport, ScenarioDefinition,
        ScenarioResult, Step,
    };
}
