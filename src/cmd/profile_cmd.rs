//! Profiling sweep command (`navigator profile ...`).

use clap::Args;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use std::path::{Path, PathBuf};

use crate::{
    Aggregation, Config, LatencyP99, Metric, NavResult, PointFailure, Profiler, ProfilerConfig,
    ProfilingResult, RunnerSpec, SweepOutcome, SweepPoint, Throughput, aggregate, save_results,
};

const JSON_ARG_HELP: &str = "Inline JSON object, or a path to a JSON file.";

#[derive(Debug, Clone, Args)]
pub struct ProfileArgs {
    /// Runner descriptor, e.g. {"kind":"perf_analyzer","model_name":"resnet50"}.
    #[arg(long, value_name = "JSON", long_help = JSON_ARG_HELP)]
    pub runner: String,
    #[arg(long, value_name = "JSON", long_help = JSON_ARG_HELP)]
    pub profiler_config: Option<String>,
    /// Results file; relative paths land in the workdir.
    #[arg(long)]
    pub results_path: Option<PathBuf>,
    #[arg(long)]
    pub model_name: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub batch_dim: usize,
    /// The model has no batch axis; only batch size 1 is profiled.
    #[arg(long)]
    pub no_batching: bool,
    #[arg(long)]
    pub max_batch_size: Option<usize>,
    #[arg(long)]
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub session_id: String,
    pub started_at: String,
    pub runner: String,
    pub results_path: PathBuf,
    pub batch_dim: Option<usize>,
    pub points: usize,
    pub unstable_points: Vec<SweepPoint>,
    pub failures: Vec<PointFailure>,
    pub best_throughput: Option<BestPoint>,
    pub best_p99_latency: Option<BestPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestPoint {
    pub batch_size: usize,
    pub concurrency: usize,
    pub value: f64,
}

pub fn profile_command(config: &Config, args: &ProfileArgs) -> NavResult<serde_json::Value> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let started_at = OffsetDateTime::now_utc().format(&Rfc3339)?;

    let mut config = config.clone();
    if let Some(workdir) = &args.workdir {
        config.workdir = workdir.clone();
    }
    // Runners start in the workdir, so paths handed to them must not be
    // relative to it a second time.
    config.workdir = std::path::absolute(&config.workdir)?;

    let spec = RunnerSpec::from_json(&read_json_arg(&args.runner)?)?;
    let runner = spec.build(&config, args.model_name.as_deref())?;
    let runner_name = runner.name().to_string();
    let profiler_config = match &args.profiler_config {
        Some(raw) => ProfilerConfig::from_json(&read_json_arg(raw)?)?,
        None => ProfilerConfig::default(),
    };
    let max_batch_size = if args.no_batching {
        Some(1)
    } else {
        args.max_batch_size
    };

    tracing::info!(%session_id, runner = %runner_name, "profiling session started");
    let outcome = Profiler::new(runner, profiler_config, max_batch_size).run()?;

    let results_path = args
        .results_path
        .as_deref()
        .unwrap_or(config.results_file.as_path());
    let results_path = config.resolve(results_path);
    save_results(&results_path, &outcome.results)?;

    let summary = summarize(
        session_id,
        started_at,
        runner_name,
        results_path,
        (!args.no_batching).then_some(args.batch_dim),
        &outcome,
    );
    Ok(serde_json::to_value(summary)?)
}

fn summarize(
    session_id: String,
    started_at: String,
    runner: String,
    results_path: PathBuf,
    batch_dim: Option<usize>,
    outcome: &SweepOutcome,
) -> ProfileSummary {
    ProfileSummary {
        session_id,
        started_at,
        runner,
        results_path,
        batch_dim,
        points: outcome.results.len(),
        unstable_points: outcome
            .results
            .iter()
            .filter(|r| !r.stable)
            .map(ProfilingResult::point)
            .collect(),
        failures: outcome.failures.clone(),
        best_throughput: best_point::<Throughput>(&outcome.results),
        best_p99_latency: best_point::<LatencyP99>(&outcome.results),
    }
}

/// Point holding the best record of kind `M` across results.
pub fn best_point<M: Metric>(results: &[ProfilingResult]) -> Option<BestPoint> {
    let records = results
        .iter()
        .filter_map(|r| r.records.get::<M>())
        .collect::<Vec<_>>();
    let best = aggregate(&records, Aggregation::Max)?;
    results
        .iter()
        .find(|r| r.records.get::<M>() == Some(best))
        .map(|r| BestPoint {
            batch_size: r.batch_size,
            concurrency: r.concurrency,
            value: best.value(),
        })
}

/// Accepts inline JSON or a path to a JSON file.
pub(crate) fn read_json_arg(raw: &str) -> NavResult<String> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(raw.to_string());
    }
    Ok(std::fs::read_to_string(Path::new(raw))?)
}
