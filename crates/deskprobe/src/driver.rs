//! Driver seam between the harness and a rendering engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  ContextPool (one browser process)                               │
//! │    └── new_context() ──► PageDriver (one browsing context)       │
//! │                                                                  │
//! │  ┌────────────────────────┐      ┌──────────────────────────┐    │
//! │  │  browser::Browser      │      │  MockPool                │    │
//! │  │  chromiumoxide / CDP   │      │  in-memory desktop model │    │
//! │  └────────────────────────┘      └──────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Session bootstrap, readiness polling and assertions are written against
//! [`PageDriver`] only, so they never reach for a global browser.

use crate::locator::{BoundingBox, ElementInfo, Locator, Occurrence, Point, Selector};
use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 800)
    }
}

/// Mouse button used for an activation gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    /// Primary (left) button
    Primary,
    /// Secondary (right) button, opens context menus
    Secondary,
}

impl MouseButton {
    /// Short label for logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Storage entries written before the application's scripts run
pub type StorageEntries = BTreeMap<String, String>;

/// One isolated browsing context with a single page
///
/// Implementations own their context: [`PageDriver::close`] releases it and
/// must be safe to call more than once.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and return once the navigation has been committed
    async fn navigate(&self, url: &str) -> HarnessResult<()>;

    /// URL of the current document
    async fn current_url(&self) -> HarnessResult<String>;

    /// Install storage entries written on every new document before any
    /// page script runs.
    ///
    /// Installing identical entries again is a no-op; different entries
    /// replace the previous installation.
    async fn install_storage_seed(&self, entries: &StorageEntries) -> HarnessResult<()>;

    /// Read one `localStorage` key of the current document
    ///
    /// Fails with [`HarnessError::Bootstrap`] when storage is unavailable.
    async fn read_storage(&self, key: &str) -> HarnessResult<Option<String>>;

    /// All elements matching the locator's selector, in document order
    async fn query(&self, locator: &Locator) -> HarnessResult<Vec<ElementInfo>>;

    /// Press and release a mouse button at a viewport point
    async fn click_at(&self, point: Point, button: MouseButton) -> HarnessResult<()>;

    /// Capture the viewport as PNG bytes
    async fn screenshot(&self) -> HarnessResult<Vec<u8>>;

    /// Emulated viewport size
    fn viewport(&self) -> Viewport;

    /// Release the browsing context
    async fn close(&self) -> HarnessResult<()>;
}

/// Hands out independent browsing contexts from one engine instance
#[async_trait]
pub trait ContextPool: Send + Sync {
    /// Page type produced by this pool
    type Page: PageDriver + 'static;

    /// Create a fresh browsing context with its own storage and DOM
    async fn new_context(&self, viewport: Viewport) -> HarnessResult<Self::Page>;
}

// ============================================================================
// Mock implementation
// ============================================================================

/// Element of the in-memory DOM
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Unique id, referenced by [`MockElement::reveals`]
    pub id: String,
    /// CSS selectors this element answers to
    pub css: Vec<String>,
    /// ARIA role
    pub role: Option<String>,
    /// Accessible name
    pub name: String,
    /// Text content
    pub text: String,
    /// Rendered box
    pub bounding_box: BoundingBox,
    /// Currently displayed
    pub shown: bool,
    /// Ids displayed when this element receives a primary click
    pub reveals: Vec<String>,
    /// A secondary click on this element opens the context menu
    pub opens_context_menu: bool,
    /// Only present when the backend API answers
    pub needs_backend: bool,
    /// Id of the enclosing element
    pub parent: Option<String>,
}

impl MockElement {
    /// Create a shown element
    #[must_use]
    pub fn new(id: impl Into<String>, bounding_box: BoundingBox) -> Self {
        Self {
            id: id.into(),
            css: Vec::new(),
            role: None,
            name: String::new(),
            text: String::new(),
            bounding_box,
            shown: true,
            reveals: Vec::new(),
            opens_context_menu: false,
            needs_backend: false,
            parent: None,
        }
    }

    /// Add a CSS selector this element matches
    #[must_use]
    pub fn css(mut self, selector: impl Into<String>) -> Self {
        self.css.push(selector.into());
        self
    }

    /// Set role and accessible name
    #[must_use]
    pub fn role(mut self, role: impl Into<String>, name: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self.name = name.into();
        self
    }

    /// Set text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Start hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.shown = false;
        self
    }

    /// Reveal another element on primary click
    #[must_use]
    pub fn reveals(mut self, id: impl Into<String>) -> Self {
        self.reveals.push(id.into());
        self
    }

    /// Open the context menu on secondary click
    #[must_use]
    pub const fn context_menu_target(mut self) -> Self {
        self.opens_context_menu = true;
        self
    }

    /// Require the backend API
    #[must_use]
    pub const fn backend_data(mut self) -> Self {
        self.needs_backend = true;
        self
    }

    /// Nest inside another element
    #[must_use]
    pub fn inside(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Css { css } => self.css.iter().any(|c| c == css),
            Selector::Role { role, name, exact } => {
                self.role.as_deref() == Some(role.as_str()) && text_matches(&self.name, name, *exact)
            }
            Selector::Text { text, exact } => text_matches(&self.text, text, *exact),
            Selector::CssWithText { css, text } => {
                self.css.iter().any(|c| c == css) && text_matches(&self.text, text, false)
            }
            Selector::TextWithin { text, exact, .. } => text_matches(&self.text, text, *exact),
        }
    }

    fn info(&self) -> ElementInfo {
        if self.shown {
            ElementInfo::visible(self.bounding_box).with_text(self.text.clone())
        } else {
            ElementInfo::hidden().with_text(self.text.clone())
        }
    }
}

fn text_matches(have: &str, want: &str, exact: bool) -> bool {
    if exact {
        have == want
    } else {
        have.to_lowercase().contains(&want.to_lowercase())
    }
}

/// Behavioral model of the application under test
#[derive(Debug, Clone)]
pub struct MockApp {
    /// Elements rendered on the application route
    pub elements: Vec<MockElement>,
    /// Id of the context-menu root
    pub menu_id: String,
    /// Route that renders [`MockApp::elements`]
    pub app_path: String,
    /// Route unauthenticated visitors are redirected to
    pub login_path: String,
    /// Storage key that marks a session as authenticated
    pub token_key: String,
    /// `localStorage` throws on access
    pub storage_blocked: bool,
    /// Backend API answers data requests
    pub backend_available: bool,
    /// Context menu ignores dismiss clicks
    pub sticky_menu: bool,
    /// Queries for this selector fail with a driver error
    pub failing_selector: Option<Selector>,
    /// Queries failing after each navigation because the document is replaced
    pub replaced_documents: usize,
    /// Artificial latency of every query
    pub query_delay: Option<Duration>,
}

impl MockApp {
    /// An empty application
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            menu_id: String::from("context-menu"),
            app_path: String::from("/desktop"),
            login_path: String::from("/login"),
            token_key: String::from("auth_token"),
            storage_blocked: false,
            backend_available: true,
            sticky_menu: false,
            failing_selector: None,
            replaced_documents: 0,
            query_delay: None,
        }
    }

    /// Model of the NAS desktop at 1280×800
    #[must_use]
    pub fn desktop() -> Self {
        let icon = |id: &str, name: &str, y: f64, window: &str| {
            MockElement::new(id, BoundingBox::new(24.0, y, 80.0, 80.0))
                .css("button.desktop-icon")
                .css(".desktop-icon")
                .role("button", name)
                .text(name)
                .reveals(window)
        };
        let elements = vec![
            MockElement::new("background", BoundingBox::new(0.0, 0.0, 1280.0, 800.0))
                .css(".desktop")
                .context_menu_target(),
            MockElement::new("menubar", BoundingBox::new(0.0, 0.0, 1280.0, 28.0))
                .css(".desktop-menubar")
                .text("Mynt NAS"),
            MockElement::new("icon-grid", BoundingBox::new(16.0, 40.0, 96.0, 200.0))
                .css(".desktop-icon-grid"),
            icon("icon-activity", "Activity Monitor", 48.0, "window-activity"),
            icon("icon-settings", "Settings", 144.0, "window-settings"),
            MockElement::new("dock", BoundingBox::new(340.0, 740.0, 600.0, 56.0))
                .css(".desktop-dock"),
            MockElement::new("window-activity", BoundingBox::new(240.0, 100.0, 800.0, 600.0))
                .css(".desktop-window")
                .hidden()
                .reveals("title-activity")
                .reveals("tab-cpu")
                .reveals("tab-memory")
                .reveals("header-process")
                .reveals("header-cpu")
                .reveals("row-process"),
            MockElement::new("title-activity", BoundingBox::new(560.0, 104.0, 160.0, 20.0))
                .text("Activity Monitor")
                .hidden()
                .inside("window-activity"),
            MockElement::new("tab-cpu", BoundingBox::new(260.0, 140.0, 60.0, 24.0))
                .role("button", "CPU")
                .text("CPU")
                .hidden()
                .inside("window-activity"),
            MockElement::new("tab-memory", BoundingBox::new(330.0, 140.0, 80.0, 24.0))
                .role("button", "Memory")
                .text("Memory")
                .hidden()
                .inside("window-activity"),
            MockElement::new("header-process", BoundingBox::new(260.0, 180.0, 200.0, 20.0))
                .text("Process Name")
                .hidden()
                .inside("window-activity"),
            MockElement::new("header-cpu", BoundingBox::new(700.0, 180.0, 60.0, 20.0))
                .text("% CPU")
                .hidden()
                .inside("window-activity"),
            MockElement::new("row-process", BoundingBox::new(260.0, 204.0, 760.0, 20.0))
                .css(".process-row")
                .text("myntd")
                .hidden()
                .inside("window-activity")
                .backend_data(),
            MockElement::new("window-settings", BoundingBox::new(240.0, 100.0, 800.0, 600.0))
                .css(".desktop-window")
                .text("Settings")
                .hidden(),
            MockElement::new("context-menu", BoundingBox::new(500.0, 500.0, 180.0, 96.0))
                .css(".context-menu")
                .text("Change Wallpaper")
                .hidden(),
        ];
        Self {
            elements,
            ..Self::new()
        }
    }

    /// Make `localStorage` throw on access
    #[must_use]
    pub const fn with_storage_blocked(mut self) -> Self {
        self.storage_blocked = true;
        self
    }

    /// Simulate an unreachable backend API
    #[must_use]
    pub const fn without_backend(mut self) -> Self {
        self.backend_available = false;
        self
    }

    /// Make the context menu ignore dismiss clicks
    #[must_use]
    pub const fn with_sticky_menu(mut self) -> Self {
        self.sticky_menu = true;
        self
    }

    /// Fail every query for a selector
    #[must_use]
    pub fn with_failing_selector(mut self, selector: Selector) -> Self {
        self.failing_selector = Some(selector);
        self
    }

    /// Fail the first `queries` queries after each navigation as if the
    /// document was replaced mid-evaluation
    #[must_use]
    pub const fn with_replaced_documents(mut self, queries: usize) -> Self {
        self.replaced_documents = queries;
        self
    }

    /// Delay every query
    #[must_use]
    pub const fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Move an element's box
    #[must_use]
    pub fn with_box(mut self, id: &str, bounding_box: BoundingBox) -> Self {
        if let Some(el) = self.elements.iter_mut().find(|e| e.id == id) {
            el.bounding_box = bounding_box;
        }
        self
    }

    /// Remove an element from the model
    #[must_use]
    pub fn without_element(mut self, id: &str) -> Self {
        self.elements.retain(|e| e.id != id);
        self
    }
}

impl Default for MockApp {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct MockState {
    url: String,
    rendered: bool,
    elements: Vec<MockElement>,
    seed: Option<StorageEntries>,
    seed_installs: usize,
    storage: StorageEntries,
    history: Vec<String>,
    closed: bool,
    replaced_left: usize,
}

/// In-memory page driver backed by a [`MockApp`]
#[derive(Debug, Clone)]
pub struct MockDriver {
    app: Arc<MockApp>,
    viewport: Viewport,
    state: Arc<Mutex<MockState>>,
    pool_closed: Option<Arc<AtomicUsize>>,
}

impl MockDriver {
    /// Create a page on `about:blank`
    #[must_use]
    pub fn new(app: MockApp, viewport: Viewport) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                url: String::from("about:blank"),
                rendered: false,
                elements: app.elements.clone(),
                seed: None,
                seed_installs: 0,
                storage: StorageEntries::new(),
                history: Vec::new(),
                closed: false,
                replaced_left: 0,
            })),
            app: Arc::new(app),
            viewport,
            pool_closed: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only happens after a panicking test
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Calls received so far, e.g. `navigate:/desktop`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }

    /// Check if a call with this prefix was received
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.state().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Current `localStorage` contents
    #[must_use]
    pub fn storage(&self) -> StorageEntries {
        self.state().storage.clone()
    }

    /// Number of effective seed installations
    #[must_use]
    pub fn seed_installs(&self) -> usize {
        self.state().seed_installs
    }

    /// Whether the context menu is currently displayed
    #[must_use]
    pub fn menu_open(&self) -> bool {
        let state = self.state();
        state
            .elements
            .iter()
            .any(|e| e.id == self.app.menu_id && e.shown && state.rendered)
    }

    /// Whether the context has been released
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn ensure_open(state: &MockState) -> HarnessResult<()> {
        if state.closed {
            Err(HarnessError::driver("browsing context already closed"))
        } else {
            Ok(())
        }
    }

    fn path_of(url: &str) -> &str {
        crate::wait::url_path(url)
    }

    fn origin_of(url: &str) -> &str {
        match url.split_once("://") {
            Some((scheme, rest)) => {
                let host_len = rest.find('/').unwrap_or(rest.len());
                &url[..scheme.len() + 3 + host_len]
            }
            None => "",
        }
    }

    fn hit(elements: &[MockElement], point: &Point) -> Option<usize> {
        elements
            .iter()
            .rposition(|e| e.shown && e.bounding_box.contains(point))
    }

    /// Matches of a selector among present elements, in document order
    fn select<'e>(present: &[&'e MockElement], selector: &Selector) -> Vec<&'e MockElement> {
        let Selector::TextWithin { scope, .. } = selector else {
            return present.iter().copied().filter(|e| e.matches(selector)).collect();
        };
        let containers = Self::select(present, scope.selector());
        let roots: Vec<&str> = match scope.occurrence_index() {
            None => containers.iter().map(|e| e.id.as_str()).collect(),
            Some(occurrence) => {
                let picked = match occurrence {
                    Occurrence::First => containers.first(),
                    Occurrence::Nth(n) => containers.get(n),
                    Occurrence::Last => containers.last(),
                };
                picked.map(|e| e.id.as_str()).into_iter().collect()
            }
        };
        let inside = |el: &MockElement| {
            let mut parent = el.parent.as_deref();
            while let Some(id) = parent {
                if roots.contains(&id) {
                    return true;
                }
                parent = present
                    .iter()
                    .find(|e| e.id == id)
                    .and_then(|e| e.parent.as_deref());
            }
            false
        };
        present
            .iter()
            .copied()
            .filter(|e| e.matches(selector) && inside(*e))
            .collect()
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str) -> HarnessResult<()> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        state.history.push(format!("navigate:{}", Self::path_of(url)));

        if !url.contains("://") {
            return Err(HarnessError::navigation(url, "invalid URL"));
        }
        if !self.app.storage_blocked {
            if let Some(seed) = state.seed.clone() {
                state.storage.extend(seed);
            }
        }

        let path = Self::path_of(url);
        let authenticated = state.storage.contains_key(&self.app.token_key);
        let public = path == "/" || path == self.app.login_path;
        state.url = if authenticated || public {
            url.to_string()
        } else {
            format!("{}{}", Self::origin_of(url), self.app.login_path)
        };
        state.rendered = Self::path_of(&state.url) == self.app.app_path;
        state.elements = self.app.elements.clone();
        state.replaced_left = self.app.replaced_documents;
        Ok(())
    }

    async fn current_url(&self) -> HarnessResult<String> {
        let state = self.state();
        Self::ensure_open(&state)?;
        Ok(state.url.clone())
    }

    async fn install_storage_seed(&self, entries: &StorageEntries) -> HarnessResult<()> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        if state.seed.as_ref() != Some(entries) {
            state.seed = Some(entries.clone());
            state.seed_installs += 1;
            state.history.push(String::from("install_storage_seed"));
        }
        Ok(())
    }

    async fn read_storage(&self, key: &str) -> HarnessResult<Option<String>> {
        let state = self.state();
        Self::ensure_open(&state)?;
        if self.app.storage_blocked {
            return Err(HarnessError::bootstrap(
                "SecurityError: access to 'localStorage' is denied for this document",
            ));
        }
        Ok(state.storage.get(key).cloned())
    }

    async fn query(&self, locator: &Locator) -> HarnessResult<Vec<ElementInfo>> {
        if let Some(delay) = self.app.query_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        Self::ensure_open(&state)?;
        if self.app.failing_selector.as_ref() == Some(locator.selector()) {
            return Err(HarnessError::driver(format!(
                "Runtime.evaluate failed for {locator}"
            )));
        }
        if state.replaced_left > 0 {
            state.replaced_left -= 1;
            return Err(HarnessError::document_replaced(
                "Execution context was destroyed, most likely because of a navigation",
            ));
        }
        if !state.rendered {
            return Ok(Vec::new());
        }
        let present: Vec<&MockElement> = state
            .elements
            .iter()
            .filter(|e| !e.needs_backend || self.app.backend_available)
            .collect();
        let found = Self::select(&present, locator.selector())
            .into_iter()
            .map(MockElement::info)
            .collect();
        Ok(found)
    }

    async fn click_at(&self, point: Point, button: MouseButton) -> HarnessResult<()> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        state
            .history
            .push(format!("click:{}@{point}", button.as_str()));
        if !state.rendered {
            return Ok(());
        }

        let menu_id = self.app.menu_id.clone();
        let target = Self::hit(&state.elements, &point);
        let on_menu = target.is_some_and(|i| state.elements[i].id == menu_id);
        match button {
            MouseButton::Secondary if on_menu => {}
            MouseButton::Secondary => {
                let opens = target.is_some_and(|i| state.elements[i].opens_context_menu);
                for el in &mut state.elements {
                    if el.id == menu_id {
                        el.shown = opens;
                        if opens {
                            // Menus open with their top-left corner at the cursor
                            el.bounding_box.x = point.x;
                            el.bounding_box.y = point.y;
                        }
                    }
                }
            }
            MouseButton::Primary if on_menu => {
                let item = target.map(|i| state.elements[i].text.clone()).unwrap_or_default();
                state.history.push(format!("menu_item:{item}"));
                for el in &mut state.elements {
                    if el.id == menu_id {
                        el.shown = false;
                    }
                }
            }
            MouseButton::Primary => {
                if !self.app.sticky_menu {
                    for el in &mut state.elements {
                        if el.id == menu_id {
                            el.shown = false;
                        }
                    }
                }
                if let Some(i) = target {
                    let mut pending = state.elements[i].reveals.clone();
                    while let Some(id) = pending.pop() {
                        if let Some(el) = state.elements.iter_mut().find(|e| e.id == id) {
                            if !el.shown {
                                el.shown = true;
                                pending.extend(el.reveals.iter().cloned());
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn screenshot(&self) -> HarnessResult<Vec<u8>> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        state.history.push(String::from("screenshot"));
        Ok(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn close(&self) -> HarnessResult<()> {
        let mut state = self.state();
        if !state.closed {
            state.closed = true;
            state.history.push(String::from("close"));
            if let Some(counter) = &self.pool_closed {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

/// Pool of [`MockDriver`] contexts sharing one [`MockApp`]
#[derive(Debug, Clone)]
pub struct MockPool {
    app: MockApp,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    pages: Arc<Mutex<Vec<MockDriver>>>,
    fail_new_context: bool,
}

impl MockPool {
    /// Create a pool for an application model
    #[must_use]
    pub fn new(app: MockApp) -> Self {
        Self {
            app,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            pages: Arc::new(Mutex::new(Vec::new())),
            fail_new_context: false,
        }
    }

    /// Make context creation fail
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail_new_context = true;
        self
    }

    /// Contexts created so far
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Contexts released so far
    #[must_use]
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pages handed out, in creation order
    #[must_use]
    pub fn pages(&self) -> Vec<MockDriver> {
        self.pages
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContextPool for MockPool {
    type Page = MockDriver;

    async fn new_context(&self, viewport: Viewport) -> HarnessResult<MockDriver> {
        if self.fail_new_context {
            return Err(HarnessError::driver("Target.createBrowserContext failed"));
        }
        let mut page = MockDriver::new(self.app.clone(), viewport);
        page.pool_closed = Some(Arc::clone(&self.closed));
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut pages) = self.pages.lock() {
            pages.push(page.clone());
        }
        Ok(page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn seeded() -> StorageEntries {
        let mut entries = StorageEntries::new();
        entries.insert("auth_token".to_string(), "mock-token".to_string());
        entries
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_path_of() {
            assert_eq!(MockDriver::path_of("http://localhost:5173/desktop"), "/desktop");
            assert_eq!(MockDriver::path_of("http://localhost:5173"), "/");
            assert_eq!(MockDriver::path_of("http://h/login?next=/x"), "/login");
        }

        #[test]
        fn test_origin_of() {
            assert_eq!(
                MockDriver::origin_of("http://localhost:5173/desktop"),
                "http://localhost:5173"
            );
        }
    }

    mod mock_driver_tests {
        use super::*;

        #[tokio::test]
        async fn test_unauthenticated_redirects_to_login() {
            let page = MockDriver::new(MockApp::desktop(), Viewport::default());
            page.navigate("http://localhost:5173/desktop").await.unwrap();
            assert_eq!(
                page.current_url().await.unwrap(),
                "http://localhost:5173/login"
            );
            let found = page.query(&Locator::by_text("Mynt NAS")).await.unwrap();
            assert!(found.is_empty());
        }

        #[tokio::test]
        async fn test_seed_applies_on_navigation() {
            let page = MockDriver::new(MockApp::desktop(), Viewport::default());
            page.install_storage_seed(&seeded()).await.unwrap();
            assert!(page.storage().is_empty());
            page.navigate("http://localhost:5173/desktop").await.unwrap();
            assert_eq!(
                page.read_storage("auth_token").await.unwrap().as_deref(),
                Some("mock-token")
            );
            assert!(page.current_url().await.unwrap().ends_with("/desktop"));
        }

        #[tokio::test]
        async fn test_identical_seed_installs_once() {
            let page = MockDriver::new(MockApp::new(), Viewport::default());
            page.install_storage_seed(&seeded()).await.unwrap();
            page.install_storage_seed(&seeded()).await.unwrap();
            assert_eq!(page.seed_installs(), 1);
        }

        #[tokio::test]
        async fn test_context_menu_opens_only_on_background() {
            let page = MockDriver::new(MockApp::desktop(), Viewport::default());
            page.install_storage_seed(&seeded()).await.unwrap();
            page.navigate("http://h/desktop").await.unwrap();

            page.click_at(Point::new(640.0, 10.0), MouseButton::Secondary)
                .await
                .unwrap();
            assert!(!page.menu_open());

            page.click_at(Point::new(500.0, 400.0), MouseButton::Secondary)
                .await
                .unwrap();
            assert!(page.menu_open());

            page.click_at(Point::new(900.0, 300.0), MouseButton::Primary)
                .await
                .unwrap();
            assert!(!page.menu_open());
            assert!(!page.was_called("menu_item:"));
        }

        #[tokio::test]
        async fn test_menu_opens_at_cursor_and_takes_item_clicks() {
            let page = MockDriver::new(MockApp::desktop(), Viewport::default());
            page.install_storage_seed(&seeded()).await.unwrap();
            page.navigate("http://h/desktop").await.unwrap();

            page.click_at(Point::new(700.0, 300.0), MouseButton::Secondary)
                .await
                .unwrap();
            let menu = page.query(&Locator::new(".context-menu")).await.unwrap();
            assert_eq!(
                menu[0].bounding_box.unwrap(),
                BoundingBox::new(700.0, 300.0, 180.0, 96.0)
            );

            page.click_at(Point::new(700.0, 300.0), MouseButton::Primary)
                .await
                .unwrap();
            assert!(!page.menu_open());
            assert!(page.was_called("menu_item:Change Wallpaper"));
        }

        #[tokio::test]
        async fn test_text_within_scope() {
            let page = MockDriver::new(MockApp::desktop(), Viewport::default());
            page.install_storage_seed(&seeded()).await.unwrap();
            page.navigate("http://h/desktop").await.unwrap();

            let in_first = Locator::by_text("CPU").within(Locator::new(".desktop-window").first());
            let in_second = Locator::by_text("CPU").within(Locator::new(".desktop-window").nth(1));
            assert_eq!(page.query(&in_first).await.unwrap().len(), 2);
            assert!(page.query(&in_second).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_icon_click_reveals_window_contents() {
            let page = MockDriver::new(MockApp::desktop(), Viewport::default());
            page.install_storage_seed(&seeded()).await.unwrap();
            page.navigate("http://h/desktop").await.unwrap();
            page.click_at(Point::new(64.0, 88.0), MouseButton::Primary)
                .await
                .unwrap();
            let tabs = page.query(&Locator::by_role("button", "CPU")).await.unwrap();
            assert_eq!(tabs.len(), 1);
            assert!(tabs[0].visible);
        }

        #[tokio::test]
        async fn test_backend_rows_absent_without_backend() {
            let page = MockDriver::new(MockApp::desktop().without_backend(), Viewport::default());
            page.install_storage_seed(&seeded()).await.unwrap();
            page.navigate("http://h/desktop").await.unwrap();
            let rows = page.query(&Locator::new(".process-row")).await.unwrap();
            assert!(rows.is_empty());
        }

        #[tokio::test]
        async fn test_blocked_storage_reports_bootstrap_error() {
            let page = MockDriver::new(
                MockApp::desktop().with_storage_blocked(),
                Viewport::default(),
            );
            let err = page.read_storage("auth_token").await.unwrap_err();
            assert_eq!(err.kind(), "bootstrap");
        }

        #[tokio::test]
        async fn test_closed_context_rejects_calls() {
            let page = MockDriver::new(MockApp::new(), Viewport::default());
            page.close().await.unwrap();
            page.close().await.unwrap();
            assert!(page.is_closed());
            assert!(page.navigate("http://h/").await.is_err());
            assert_eq!(page.history().iter().filter(|c| *c == "close").count(), 1);
        }
    }

    mod mock_pool_tests {
        use super::*;

        #[tokio::test]
        async fn test_contexts_are_isolated() {
            let pool = MockPool::new(MockApp::desktop());
            let a = pool.new_context(Viewport::default()).await.unwrap();
            let b = pool.new_context(Viewport::default()).await.unwrap();
            a.install_storage_seed(&seeded()).await.unwrap();
            a.navigate("http://h/desktop").await.unwrap();
            b.navigate("http://h/desktop").await.unwrap();
            assert!(a.storage().contains_key("auth_token"));
            assert!(b.storage().is_empty());
            assert_eq!(pool.opened(), 2);
        }

        #[tokio::test]
        async fn test_close_is_counted_once() {
            let pool = MockPool::new(MockApp::new());
            let page = pool.new_context(Viewport::new(800, 600)).await.unwrap();
            assert_eq!(page.viewport(), Viewport::new(800, 600));
            page.close().await.unwrap();
            page.close().await.unwrap();
            assert_eq!(pool.closed(), 1);
        }

        #[tokio::test]
        async fn test_failing_pool() {
            let pool = MockPool::new(MockApp::new()).failing();
            assert!(pool.new_context(Viewport::default()).await.is_err());
        }
    }
}
