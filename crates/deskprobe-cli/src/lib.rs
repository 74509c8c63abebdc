//! Deskprobe CLI library
//!
//! Command-line front end for the deskprobe verification harness: loads the
//! configuration, installs logging, picks scenarios and reports results.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, LogFormatArg, Overrides, RunArgs};
pub use config::{
    apply_overrides, load_harness_config, CliConfig, ColorChoice, LogFormat, Verbosity,
};
pub use error::{CliError, CliResult};
pub use output::ConsoleReporter;
pub use runner::{effective_config, select_scenarios};
#[cfg(feature = "browser")]
pub use runner::run_scenarios;
