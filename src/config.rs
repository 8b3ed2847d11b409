//! `navigator.toml` config loading.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ExternalTool;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Working directory for exported models, samples and reports.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// `perf_analyzer` executable (name on PATH or absolute path).
    #[serde(default = "default_perf_analyzer")]
    pub perf_analyzer: PathBuf,

    /// `model-analyzer` executable.
    #[serde(default = "default_model_analyzer")]
    pub model_analyzer: PathBuf,

    /// Wall-clock bound for every external tool invocation.
    #[serde(default)]
    pub process_timeout_secs: Option<u64>,

    /// Results file name used when `--results-path` is relative to nothing.
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_perf_analyzer() -> PathBuf {
    PathBuf::from("perf_analyzer")
}

fn default_model_analyzer() -> PathBuf {
    PathBuf::from("model-analyzer")
}

fn default_results_file() -> PathBuf {
    PathBuf::from("profiling_results.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            perf_analyzer: default_perf_analyzer(),
            model_analyzer: default_model_analyzer(),
            process_timeout_secs: None,
            results_file: default_results_file(),
        }
    }
}

impl Config {
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }

    pub fn perf_analyzer_tool(&self) -> ExternalTool {
        ExternalTool::new(self.perf_analyzer.clone())
    }

    pub fn model_analyzer_tool(&self) -> ExternalTool {
        ExternalTool::new(self.model_analyzer.clone())
    }

    /// Resolves `path` against the configured workdir unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }
}
