//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a selector plus an optional occurrence index. Locators
//! are strict: when several elements match and no occurrence was given, the
//! check that uses the locator fails instead of silently picking one.
//!
//! Every selector compiles to one JavaScript expression returning the list of
//! matches in document order, each described by an [`ElementInfo`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in viewport coordinates (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Rendered rectangle of an element, relative to the viewport origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the center point
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if a point is inside this box (right/bottom edges exclusive)
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    /// Whether the box has a non-zero rendered area
    #[must_use]
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{x: {}, y: {}, width: {}, height: {}}}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// What the engine reports about one matched element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Non-zero size and not hidden by `display`/`visibility`
    pub visible: bool,
    /// Rendered box, `None` when the element produces no layout box
    pub bounding_box: Option<BoundingBox>,
    /// Normalized text content
    #[serde(default)]
    pub text: String,
}

impl ElementInfo {
    /// Create a visible element with the given box
    #[must_use]
    pub fn visible(bounding_box: BoundingBox) -> Self {
        Self {
            visible: bounding_box.has_area(),
            bounding_box: Some(bounding_box),
            text: String::new(),
        }
    }

    /// Create an element that is present in the DOM but not rendered
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            visible: false,
            bounding_box: None,
            text: String::new(),
        }
    }

    /// Attach text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// Which of several matches a locator refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occurrence {
    /// First match in document order
    First,
    /// Zero-based index
    Nth(usize),
    /// Last match in document order
    Last,
}

impl Occurrence {
    /// Pick the referenced element
    #[must_use]
    pub fn pick<'a>(&self, matches: &'a [ElementInfo]) -> Option<&'a ElementInfo> {
        match self {
            Self::First => matches.first(),
            Self::Nth(n) => matches.get(*n),
            Self::Last => matches.last(),
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Nth(n) => write!(f, "nth({n})"),
            Self::Last => write!(f, "last"),
        }
    }
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., ".desktop-menubar")
    Css {
        /// Selector text
        css: String,
    },
    /// ARIA role plus accessible name
    Role {
        /// Role (e.g., "button")
        role: String,
        /// Accessible name
        name: String,
        /// Require an exact name match instead of a case-insensitive substring
        #[serde(default)]
        exact: bool,
    },
    /// Visible text content (innermost matching element)
    Text {
        /// Text to match
        text: String,
        /// Require exact (whitespace-normalized) equality
        #[serde(default)]
        exact: bool,
    },
    /// CSS selector filtered by text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Visible text inside the elements of another locator
    TextWithin {
        /// Containers searched; an occurrence narrows them to one
        scope: Box<Locator>,
        /// Text to match
        text: String,
        /// Require exact (whitespace-normalized) equality
        #[serde(default)]
        exact: bool,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            css: selector.into(),
        }
    }

    /// Create a role selector with substring name matching
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
            exact: false,
        }
    }

    /// Create a text selector with substring matching
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Convert to a JavaScript expression evaluating to an array of elements
    #[must_use]
    pub fn to_match_expression(&self) -> String {
        match self {
            Self::Css { css } => {
                format!("Array.from(document.querySelectorAll({}))", js_string(css))
            }
            Self::Role { role, name, exact } => {
                let candidates = match implicit_role_selector(role) {
                    Some(implicit) => format!("[role={}], {implicit}", css_attr(role)),
                    None => format!("[role={}]", css_attr(role)),
                };
                format!(
                    "Array.from(document.querySelectorAll({candidates})).filter(el => {MATCH_FN}({NAME_FN}(el), {needle}, {exact}))",
                    candidates = js_string(&candidates),
                    needle = js_string(name),
                )
            }
            Self::Text { text, exact } => format!(
                "(() => {{ const hit = el => {MATCH_FN}({TEXT_FN}(el), {needle}, {exact}); \
                 return Array.from(document.body ? document.body.querySelectorAll('*') : []) \
                 .filter(el => hit(el) && !Array.from(el.children).some(hit)); }})()",
                needle = js_string(text),
            ),
            Self::CssWithText { css, text } => format!(
                "Array.from(document.querySelectorAll({css})).filter(el => {MATCH_FN}({TEXT_FN}(el), {needle}, false))",
                css = js_string(css),
                needle = js_string(text),
            ),
            Self::TextWithin { scope, text, exact } => {
                let roots = match scope.occurrence_index() {
                    None => String::from("all"),
                    Some(Occurrence::First) => String::from("all.slice(0, 1)"),
                    Some(Occurrence::Nth(n)) => format!("all.slice({n}, {})", n + 1),
                    Some(Occurrence::Last) => String::from("all.slice(-1)"),
                };
                format!(
                    "(() => {{ const all = {scope_expr}; const hit = el => {MATCH_FN}({TEXT_FN}(el), {needle}, {exact}); \
                     const seen = new Set(); \
                     return {roots}.flatMap(root => Array.from(root.querySelectorAll('*'))) \
                     .filter(el => !seen.has(el) && seen.add(el) && hit(el) && !Array.from(el.children).some(hit)); }})()",
                    scope_expr = scope.selector().to_match_expression(),
                    needle = js_string(text),
                )
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { css } => write!(f, "css={css}"),
            Self::Role { role, name, .. } => write!(f, "role={role}[name={name:?}]"),
            Self::Text { text, .. } => write!(f, "text={text:?}"),
            Self::CssWithText { css, text } => write!(f, "css={css}:has-text({text:?})"),
            Self::TextWithin { scope, text, .. } => write!(f, "{scope} >> text={text:?}"),
        }
    }
}

const TEXT_FN: &str = "((el) => (el.innerText || el.textContent || '').replace(/\\s+/g, ' ').trim())";

const NAME_FN: &str = "((el) => (el.getAttribute('aria-label') || el.getAttribute('title') || el.innerText || el.textContent || el.value || '').replace(/\\s+/g, ' ').trim())";

const MATCH_FN: &str = "((have, want, exact) => exact ? have === want : have.toLowerCase().includes(want.toLowerCase()))";

const ELEMENT_INFO_FN: &str = "(el => { \
    const rects = el.getClientRects(); \
    const r = el.getBoundingClientRect(); \
    const s = window.getComputedStyle(el); \
    const boxed = rects.length > 0; \
    return { \
        visible: boxed && r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none', \
        bounding_box: boxed ? { x: r.x, y: r.y, width: r.width, height: r.height } : null, \
        text: (el.innerText || el.textContent || '').replace(/\\s+/g, ' ').trim() \
    }; })";

fn implicit_role_selector(role: &str) -> Option<&'static str> {
    match role {
        "button" => Some("button, input[type=button], input[type=submit], input[type=reset]"),
        "link" => Some("a[href]"),
        "heading" => Some("h1, h2, h3, h4, h5, h6"),
        "textbox" => Some("input:not([type]), input[type=text], input[type=email], textarea"),
        "checkbox" => Some("input[type=checkbox]"),
        "menu" => Some("menu"),
        "dialog" => Some("dialog"),
        "tab" => None,
        _ => None,
    }
}

/// Quote a string as a JavaScript string literal
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Quote a string as a CSS attribute value
fn css_attr(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// A locator for finding elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// The selector for finding elements
    selector: Selector,
    /// Which match to use; `None` means exactly one match is required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    occurrence: Option<Occurrence>,
}

impl Locator {
    /// Create a new locator with a CSS selector
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::css(selector))
    }

    /// Create a locator from a selector
    #[must_use]
    pub const fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            occurrence: None,
        }
    }

    /// Locate by ARIA role and accessible name
    #[must_use]
    pub fn by_role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_selector(Selector::role(role, name))
    }

    /// Locate by visible text
    #[must_use]
    pub fn by_text(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::text(text))
    }

    /// Filter a CSS locator by text content
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        let selector = match self.selector {
            Selector::Css { css } => Selector::CssWithText {
                css,
                text: text.into(),
            },
            other => other,
        };
        Self {
            selector,
            occurrence: self.occurrence,
        }
    }

    /// Restrict a text locator to descendants of `scope`
    ///
    /// Other selector kinds are returned unchanged.
    #[must_use]
    pub fn within(self, scope: Self) -> Self {
        let selector = match self.selector {
            Selector::Text { text, exact } => Selector::TextWithin {
                scope: Box::new(scope),
                text,
                exact,
            },
            other => other,
        };
        Self {
            selector,
            occurrence: self.occurrence,
        }
    }

    /// Require an exact name/text match
    #[must_use]
    pub fn exact(mut self) -> Self {
        match &mut self.selector {
            Selector::Role { exact, .. }
            | Selector::Text { exact, .. }
            | Selector::TextWithin { exact, .. } => *exact = true,
            Selector::Css { .. } | Selector::CssWithText { .. } => {}
        }
        self
    }

    /// Use the first match
    #[must_use]
    pub const fn first(self) -> Self {
        self.occurrence(Occurrence::First)
    }

    /// Use the match at a zero-based index
    #[must_use]
    pub const fn nth(self, index: usize) -> Self {
        self.occurrence(Occurrence::Nth(index))
    }

    /// Use the last match
    #[must_use]
    pub const fn last(self) -> Self {
        self.occurrence(Occurrence::Last)
    }

    /// Set the occurrence explicitly
    #[must_use]
    pub const fn occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the occurrence, if any
    #[must_use]
    pub const fn occurrence_index(&self) -> Option<Occurrence> {
        self.occurrence
    }

    /// JavaScript expression returning one [`ElementInfo`] per match
    #[must_use]
    pub fn to_probe_script(&self) -> String {
        format!(
            "({}).map({ELEMENT_INFO_FN})",
            self.selector.to_match_expression()
        )
    }

    /// Resolve the referenced element among all matches
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when nothing matches, the occurrence
    /// is out of range, or a strict locator matched more than one element.
    pub fn resolve<'a>(&self, matches: &'a [ElementInfo]) -> Result<&'a ElementInfo, String> {
        match self.occurrence {
            Some(occurrence) => occurrence.pick(matches).ok_or_else(|| {
                format!(
                    "{self}: no element at {occurrence} ({} match(es))",
                    matches.len()
                )
            }),
            None => match matches {
                [] => Err(format!("{self}: no matching element")),
                [only] => Ok(only),
                many => Err(format!(
                    "{self}: strict mode violation, {} elements matched; pick an occurrence",
                    many.len()
                )),
            },
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.occurrence {
            Some(occurrence) => write!(f, "{} >> {occurrence}", self.selector),
            None => write!(f, "{}", self.selector),
        }
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::from_selector(selector)
    }
}
