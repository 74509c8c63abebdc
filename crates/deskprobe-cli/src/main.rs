//! Deskprobe CLI: headless-browser checks for the NAS desktop UI
//!
//! ## Usage
//!
//! ```bash
//! deskprobe run                          # Run every built-in scenario
//! deskprobe run context-menu --json r.json
//! deskprobe list                         # Show built-in scenarios
//! deskprobe config --base-url http://nas.local:5173
//! ```

use clap::Parser;
use deskprobe::{catalog, HarnessConfig};
use deskprobe_cli::{
    effective_config, logging, select_scenarios, Cli, CliConfig, CliResult, ColorChoice, Commands,
    ConfigArgs, ConsoleReporter, RunArgs, Verbosity,
};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(
        config.verbosity,
        config.log_format,
        config.color.should_color(),
    )?;

    match cli.command {
        Commands::Run(args) => run_scenarios(&config, cli.config.as_deref(), &args),
        Commands::List => {
            run_list(&config);
            Ok(true)
        }
        Commands::Config(args) => run_config(cli.config.as_deref(), &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.into();
    if !color.should_color() {
        console::set_colors_enabled(false);
    }

    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_log_format(cli.log_format.into())
}

fn run_list(config: &CliConfig) {
    let reporter = ConsoleReporter::new(config.color.should_color(), false);
    for scenario in catalog::all(&HarnessConfig::default()) {
        reporter.info(&format!("{:<18} {}", scenario.name, scenario.description));
    }
}

fn run_config(path: Option<&Path>, args: &ConfigArgs) -> CliResult<bool> {
    let harness_config = effective_config(path, &args.overrides)?;
    print!("{}", serde_yaml_ng::to_string(&harness_config)?);
    Ok(true)
}

#[cfg(feature = "browser")]
fn run_scenarios(config: &CliConfig, path: Option<&Path>, args: &RunArgs) -> CliResult<bool> {
    let harness_config = effective_config(path, &args.overrides)?;
    let scenarios = select_scenarios(&harness_config, &args.scenarios)?;
    let mut reporter = ConsoleReporter::new(config.color.should_color(), config.verbosity.is_quiet());

    if config.verbosity.is_verbose() {
        reporter.info(&format!(
            "Running {} scenario(s) against {}",
            scenarios.len(),
            harness_config.base_url
        ));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(deskprobe_cli::run_scenarios(
        harness_config,
        &scenarios,
        &mut reporter,
    ))?;

    if let Some(json_path) = &args.json {
        report.write_json(json_path)?;
        reporter.info(&format!("Report written to {}", json_path.display()));
    }
    reporter.summary(&report);

    Ok(report.passed())
}

#[cfg(not(feature = "browser"))]
fn run_scenarios(_config: &CliConfig, path: Option<&Path>, args: &RunArgs) -> CliResult<bool> {
    let harness_config = effective_config(path, &args.overrides)?;
    select_scenarios(&harness_config, &args.scenarios)?;
    Err(deskprobe_cli::CliError::config(
        "browser support not enabled. Rebuild with --features browser",
    ))
}
