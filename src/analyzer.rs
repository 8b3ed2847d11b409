//! Local `model-analyzer` subprocess driver.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::collections::BTreeMap;
use std::fmt;

use crate::perf_config::{is_truthy, render_value};
use crate::{ExternalTool, NavResult, ProcessOptions, ProcessOutput, run_checked};

/// Anything that renders into command-line arguments for an external tool.
pub trait CliConfig {
    fn to_cli_string(&self) -> String;

    fn to_cli_args(&self) -> Vec<String> {
        self.to_cli_string()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerMode {
    Profile,
    Analyze,
}

impl AnalyzerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Analyze => "analyze",
        }
    }
}

impl fmt::Display for AnalyzerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl clap::ValueEnum for AnalyzerMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Profile, Self::Analyze]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Free-form `--key=value` arguments for `model-analyzer`. `true` renders as
/// a bare `--key`; falsy values are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyzerConfig {
    args: BTreeMap<String, Value>,
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.args.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }
}

impl CliConfig for AnalyzerConfig {
    fn to_cli_string(&self) -> String {
        self.args
            .iter()
            .filter(|(_, v)| is_truthy(v))
            .map(|(k, v)| match v {
                Value::Bool(_) => format!("--{k}"),
                other => format!("--{k}={}", render_value(other)),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct ModelAnalyzer<C> {
    tool: ExternalTool,
    config: C,
    options: ProcessOptions,
}

impl<C: CliConfig> ModelAnalyzer<C> {
    pub fn new(tool: ExternalTool, config: C, options: ProcessOptions) -> Self {
        Self {
            tool,
            config,
            options,
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Runs `<executable> <mode> <config args>`; a non-zero exit is an error.
    pub fn run(&self, mode: AnalyzerMode) -> NavResult<ProcessOutput> {
        let mut args = vec![mode.as_str().to_string()];
        args.extend(self.config.to_cli_args());
        tracing::debug!(
            "model analyzer command: {:?}",
            self.tool.command_line(&args)
        );
        run_checked(&self.tool, &args, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzer_config_renders_sorted_long_args() {
        let mut cfg = AnalyzerConfig::new();
        cfg.set("profile-models", "resnet50");
        cfg.set("override-output-model-repository", true);
        cfg.set("checkpoint-directory", "");
        assert_eq!(
            cfg.to_cli_string(),
            "--override-output-model-repository --profile-models=resnet50"
        );
        assert_eq!(cfg.to_cli_args().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn run_passes_mode_then_config_args() {
        let mut cfg = AnalyzerConfig::new();
        cfg.set("model-repository", "/models");
        let tool = ExternalTool::new("sh").with_prefix_args(["-c", "echo \"$0 $1\""]);
        let analyzer = ModelAnalyzer::new(tool, cfg, ProcessOptions::default());
        let out = analyzer.run(AnalyzerMode::Analyze).expect("run");
        assert_eq!(out.stdout.trim(), "analyze --model-repository=/models");
    }

    #[cfg(unix)]
    #[test]
    fn failing_analyzer_surfaces_exit_status() {
        let tool = ExternalTool::new("sh").with_prefix_args(["-c", "echo no models >&2; exit 2"]);
        let analyzer = ModelAnalyzer::new(tool, AnalyzerConfig::new(), ProcessOptions::default());
        let err = analyzer.run(AnalyzerMode::Profile).expect_err("must fail");
        let msg = err.to_string();
        assert!(msg.contains("exit status 2 "), "message: {msg}");
        assert!(msg.contains("no models"), "message: {msg}");
    }
}
