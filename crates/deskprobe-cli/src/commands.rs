//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Deskprobe: headless-browser verification for the NAS desktop UI
#[derive(Parser, Debug)]
#[command(name = "deskprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only failures and errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "DESKPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run verification scenarios against the desktop
    Run(RunArgs),

    /// List built-in scenarios
    List,

    /// Show the effective configuration as YAML
    Config(ConfigArgs),
}

/// Values that override the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Base URL of the application
    #[arg(long, env = "DESKPROBE_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory for screenshots
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Readiness timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Settle delay after interactions in milliseconds
    #[arg(long)]
    pub settle: Option<u64>,

    /// Window centering tolerance in pixels
    #[arg(long)]
    pub tolerance: Option<u32>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the Chromium executable
    #[arg(long, env = "DESKPROBE_CHROMIUM")]
    pub chromium: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenarios to run (default: all)
    pub scenarios: Vec<String>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Configuration overrides
    #[command(flatten)]
    pub overrides: Overrides,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration overrides
    #[command(flatten)]
    pub overrides: Overrides,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_defaults() {
            let cli = Cli::try_parse_from(["deskprobe", "run"]).unwrap();
            match cli.command {
                Commands::Run(args) => {
                    assert!(args.scenarios.is_empty());
                    assert!(args.json.is_none());
                    assert!(!args.overrides.headed);
                }
                _ => panic!("expected run"),
            }
            assert_eq!(cli.verbose, 0);
            assert!(!cli.quiet);
        }

        #[test]
        fn test_parse_run_with_overrides() {
            let cli = Cli::try_parse_from([
                "deskprobe",
                "-vv",
                "run",
                "context-menu",
                "window-centering",
                "--base-url",
                "http://nas.local:8080",
                "--tolerance",
                "3",
                "--no-sandbox",
                "--json",
                "out/report.json",
            ])
            .unwrap();
            assert_eq!(cli.verbose, 2);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.scenarios, vec!["context-menu", "window-centering"]);
            assert_eq!(
                args.overrides.base_url.as_deref(),
                Some("http://nas.local:8080")
            );
            assert_eq!(args.overrides.tolerance, Some(3));
            assert!(args.overrides.no_sandbox);
            assert_eq!(args.json, Some(PathBuf::from("out/report.json")));
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli =
                Cli::try_parse_from(["deskprobe", "list", "--color", "never", "-q"]).unwrap();
            assert!(matches!(cli.command, Commands::List));
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(cli.quiet);
        }

        #[test]
        fn test_log_format_json() {
            let cli = Cli::try_parse_from(["deskprobe", "--log-format", "json", "list"]).unwrap();
            assert!(matches!(cli.log_format, LogFormatArg::Json));
        }

        #[test]
        fn test_subcommand_required() {
            assert!(Cli::try_parse_from(["deskprobe"]).is_err());
        }
    }
}
