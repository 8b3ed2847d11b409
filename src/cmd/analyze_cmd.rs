//! `navigator analyze <profile|analyze>`: drives a local model analyzer.

use clap::Args;

use std::path::PathBuf;

use crate::cmd::profile_cmd::read_json_arg;
use crate::{AnalyzerConfig, AnalyzerMode, Config, ModelAnalyzer, NavResult, ProcessOptions};

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    #[arg(value_enum)]
    pub mode: AnalyzerMode,
    /// Analyzer arguments as a JSON object of `key: value` pairs (inline or file).
    #[arg(long, value_name = "JSON")]
    pub analyzer_config: Option<String>,
    #[arg(long)]
    pub workdir: Option<PathBuf>,
}

pub fn analyze_command(config: &Config, args: &AnalyzeArgs) -> NavResult<serde_json::Value> {
    let analyzer_config = match &args.analyzer_config {
        Some(raw) => serde_json::from_str::<AnalyzerConfig>(&read_json_arg(raw)?)?,
        None => AnalyzerConfig::new(),
    };
    let workdir = args.workdir.as_ref().unwrap_or(&config.workdir);
    let analyzer = ModelAnalyzer::new(
        config.model_analyzer_tool(),
        analyzer_config,
        ProcessOptions::new(Some(workdir.as_path()), config.process_timeout()),
    );
    let output = analyzer.run(args.mode)?;
    tracing::info!(mode = %args.mode, elapsed_ms = output.elapsed_ms, "model analyzer finished");
    Ok(serde_json::json!({
        "mode": args.mode.as_str(),
        "command": output.command_line(),
        "exitCode": output.exit_code,
        "elapsedMs": output.elapsed_ms,
        "stdout": output.stdout,
    }))
}
