mod cli_logger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::process::ExitCode;

use navigator::{
    AnalyzeArgs, Config, ExportArgs, ProfileArgs, ResultsCommand, analyze_command,
    export_command, profile_command, results_command,
};

use cli_logger::CliLogger;

#[derive(Debug, Parser)]
#[command(name = "navigator", version, about = "Model export and performance profiling")]
struct Cli {
    /// Path to navigator.toml; a missing file means defaults.
    #[arg(long, global = true, default_value = "navigator.toml")]
    config: PathBuf,
    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sweep batch size and concurrency with a runner and save the results.
    Profile(ProfileArgs),
    /// Run the local model analyzer in profile or analyze mode.
    Analyze(AnalyzeArgs),
    /// Export a model through an external exporter command.
    Export(ExportArgs),
    /// Inspect saved profiling results.
    #[command(subcommand)]
    Results(ResultsCommand),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let logger = CliLogger::new(cli.json, cli.no_color);
    match run(&cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logger.print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, logger: &CliLogger) -> Result<()> {
    let config = Config::load_optional(&cli.config);
    match &cli.command {
        Command::Profile(args) => {
            let summary = profile_command(&config, args)?;
            warn_on_partial_sweep(logger, &summary);
            logger.print_serialized(&summary)
        }
        Command::Analyze(args) => logger.print_serialized(&analyze_command(&config, args)?),
        Command::Export(args) => logger.print_serialized(&export_command(&config, args)?),
        Command::Results(cmd @ ResultsCommand::Show { .. }) => {
            match results_command(&config, cmd)? {
                Value::Array(rows) => logger.print_table(&rows),
                other => logger.print_serialized(&other),
            }
        }
        Command::Results(cmd) => logger.print_serialized(&results_command(&config, cmd)?),
    }
}

fn warn_on_partial_sweep(logger: &CliLogger, summary: &Value) {
    let count = |key: &str| summary.get(key).and_then(Value::as_array).map_or(0, Vec::len);
    let failed = count("failures");
    if failed > 0 {
        logger.print_warning(&format!("{failed} sweep point(s) failed and were skipped"));
    }
    let unstable = count("unstablePoints");
    if unstable > 0 {
        logger.print_warning(&format!(
            "{unstable} point(s) did not stabilize; their records use the last trials"
        ));
    }
}
