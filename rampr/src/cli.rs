use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::scenarios::BuiltinScenario;

/// Same grammar as the config file: humantime strings, or bare integers as seconds.
fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m30s)".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}': {err} (expected e.g. 10s, 250ms, 1m30s)"))
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable progress and summary.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "rampr",
    author,
    version,
    about = "Stage-driven virtual user load generator",
    long_about = "rampr drives a pool of virtual users through a ramping stage profile.\n\nA YAML config lists the stages (duration + target VUs) and engine options; each virtual user runs a built-in scenario in a loop until it is retired or the run ends.",
    after_help = "Examples:\n  rampr run load.yaml\n  rampr run load.yaml --base-url http://localhost:8000\n  rampr run load.yaml --scenario noop --tick 250ms --output json\n  rampr run load.yaml --summary-export results/summary.json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a staged load test
    #[command(
        long_about = "Run the stage profile from a YAML config.\n\nCLI flags override values from the config file."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the run config (.yaml)
    pub config: PathBuf,

    /// Base URL of the system under test (overrides `baseUrl`)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Built-in scenario to run (overrides `scenario`)
    #[arg(long, value_enum)]
    pub scenario: Option<BuiltinScenario>,

    /// Pause between iterations of one VU (e.g. 1s, 250ms)
    #[arg(long, value_parser = parse_duration)]
    pub pacing: Option<Duration>,

    /// Scheduler tick interval (e.g. 1s, 100ms)
    #[arg(long, value_parser = parse_duration)]
    pub tick: Option<Duration>,

    /// How long to wait for in-flight iterations at shutdown
    #[arg(long, value_parser = parse_duration)]
    pub shutdown_timeout: Option<Duration>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Write the final snapshot and run summary as pretty JSON
    #[arg(long, value_name = "PATH")]
    pub summary_export: Option<PathBuf>,
}
