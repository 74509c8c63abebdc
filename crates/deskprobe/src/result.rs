//! Result and error types for deskprobe.
//!
//! Only hard failures live here. A check that does not hold is data
//! ([`crate::CheckRecord`]), never an error.

use thiserror::Error;

/// Result type for deskprobe operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that abort a scenario
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Session seeding failed; every downstream check is invalid
    #[error("Session bootstrap failed: {message}")]
    Bootstrap {
        /// Error message
        message: String,
    },

    /// A readiness condition did not hold within its budget
    #[error("Timed out after {elapsed_ms}ms waiting for {condition}")]
    ReadinessTimeout {
        /// Description of the condition that was awaited
        condition: String,
        /// Time spent waiting
        elapsed_ms: u64,
    },

    /// Navigation could not be issued or committed
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// The browser process or browsing context misbehaved
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// The document was replaced while a script was evaluating in it
    ///
    /// Raised while a navigation is in flight; readiness polling retries it,
    /// everywhere else it aborts like a driver error.
    #[error("Document replaced during evaluation: {message}")]
    DocumentReplaced {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HarnessError {
    /// Create a bootstrap error
    #[must_use]
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap {
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a document-replaced error
    #[must_use]
    pub fn document_replaced(message: impl Into<String>) -> Self {
        Self::DocumentReplaced {
            message: message.into(),
        }
    }

    /// Classify a failed script evaluation
    ///
    /// Chromium reports a destroyed or unknown execution context when the
    /// page navigated under the evaluation; anything else is a driver error.
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        const REPLACED: [&str; 2] = [
            "Execution context was destroyed",
            "Cannot find context with specified id",
        ];
        let message = message.into();
        if REPLACED.iter().any(|m| message.contains(m)) {
            Self::document_replaced(message)
        } else {
            Self::driver(message)
        }
    }

    /// Create a navigation error
    #[must_use]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short stable label used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bootstrap { .. } => "bootstrap",
            Self::ReadinessTimeout { .. } => "readiness-timeout",
            Self::Navigation { .. } => "navigation",
            Self::Driver { .. } => "driver",
            Self::DocumentReplaced { .. } => "document-replaced",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }

    /// Whether this error was raised by a readiness wait
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadinessTimeout { .. })
    }

    /// Whether a retry on the next document can succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::DocumentReplaced { .. })
    }
}
