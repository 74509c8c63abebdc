//! CLI configuration

use crate::commands::Overrides;
use crate::error::CliResult;
use deskprobe::HarnessConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - failures and errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Check if debug mode
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// Default log filter when `RUST_LOG` is unset
    #[must_use]
    pub const fn default_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "deskprobe=info,warn",
            Self::Debug => "deskprobe=debug,info",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Text,
    /// JSON lines
    Json,
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Log line format
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set log format
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

/// Load the harness configuration, falling back to defaults without a file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed
pub fn load_harness_config(path: Option<&Path>) -> CliResult<HarnessConfig> {
    match path {
        Some(path) => Ok(HarnessConfig::from_yaml_file(path)?),
        None => Ok(HarnessConfig::default()),
    }
}

/// Apply command-line overrides on top of a loaded configuration
#[must_use]
pub fn apply_overrides(mut config: HarnessConfig, overrides: &Overrides) -> HarnessConfig {
    if let Some(url) = &overrides.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(dir) = &overrides.artifact_dir {
        config = config.with_artifact_dir(dir.clone());
    }
    if let Some(ms) = overrides.timeout {
        config = config.with_ready_timeout(ms);
    }
    if let Some(ms) = overrides.settle {
        config = config.with_settle(ms);
    }
    if let Some(px) = overrides.tolerance {
        config = config.with_tolerance(px);
    }
    if overrides.headed {
        config.browser = config.browser.with_headless(false);
    }
    if overrides.no_sandbox {
        config.browser = config.browser.with_no_sandbox();
    }
    if let Some(path) = &overrides.chromium {
        config.browser = config.browser.with_chromium_path(path.clone());
    }
    config
}
