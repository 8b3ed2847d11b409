//! Stabilized runner backed by the external `perf_analyzer` binary.
//!
//! `perf_analyzer` runs its own measurement windows until the latency is
//! stable, so every sweep point is a single subprocess call. Statistics are
//! read from the client block of its stdout (microseconds).

use crate::{
    CliConfig, ExternalTool, LatencyStatistics, MeasurementMode, NavResult, NavigatorError,
    PerfAnalyzerConfig, PerfArg, PerfKey, PerfOption, ProcessOptions, ProfilerConfig,
    StabilizedRunner, SweepPoint, run_checked,
};

const USEC_PER_MS: f64 = 1000.0;

pub struct PerfAnalyzerRunner {
    tool: ExternalTool,
    base: PerfAnalyzerConfig,
    options: ProcessOptions,
    stats: Option<LatencyStatistics>,
}

impl PerfAnalyzerRunner {
    pub fn new(tool: ExternalTool, base: PerfAnalyzerConfig, options: ProcessOptions) -> Self {
        Self {
            tool,
            base,
            options,
            stats: None,
        }
    }

    pub fn base_config(&self) -> &PerfAnalyzerConfig {
        &self.base
    }

    /// Config used for one sweep point: the base config plus batch size and a
    /// single-value concurrency range.
    pub fn config_for(&self, point: &SweepPoint) -> NavResult<PerfAnalyzerConfig> {
        let mut cfg = self.base.clone();
        cfg.set_option(PerfOption::BatchSize, point.batch_size);
        cfg.set(
            "concurrency-range",
            format!("{}:{}", point.concurrency, point.concurrency),
        )?;
        Ok(cfg)
    }

    fn set_default_arg(&mut self, arg: PerfArg, value: impl Into<serde_json::Value>) {
        if self.base.get_key(PerfKey::Arg(arg)).is_none() {
            self.base.set_arg(arg, value);
        }
    }

    fn stat(&self, pick: impl Fn(&LatencyStatistics) -> f64) -> f64 {
        self.stats.as_ref().map(pick).unwrap_or(0.0)
    }
}

impl StabilizedRunner for PerfAnalyzerRunner {
    fn name(&self) -> &str {
        "perf_analyzer"
    }

    /// Explicit runner params win over the sweep settings.
    fn configure(&mut self, config: &ProfilerConfig) {
        if config.measurement_mode == MeasurementMode::TimeWindows {
            self.set_default_arg(PerfArg::MeasurementInterval, config.measurement_interval_ms);
        }
        self.set_default_arg(PerfArg::StabilityPercentage, config.stability_percentage);
        self.set_default_arg(PerfArg::MaxTrials, config.max_trials);
    }

    fn measure(&mut self, point: &SweepPoint) -> NavResult<()> {
        let cfg = self.config_for(point)?;
        self.stats = None;
        let output = run_checked(&self.tool, &cfg.to_cli_args(), &self.options)?;
        let stats = parse_perf_output(&output.stdout).ok_or_else(|| {
            NavigatorError::Runner(format!(
                "could not read latency statistics from `{}` output",
                output.command_line()
            ))
        })?;
        self.stats = Some(stats);
        Ok(())
    }

    fn avg_latency(&self) -> f64 {
        self.stat(|s| s.avg_ms)
    }

    fn std_latency(&self) -> f64 {
        self.stat(|s| s.std_ms)
    }

    fn p50_latency(&self) -> f64 {
        self.stat(|s| s.p50_ms)
    }

    fn p90_latency(&self) -> f64 {
        self.stat(|s| s.p90_ms)
    }

    fn p95_latency(&self) -> f64 {
        self.stat(|s| s.p95_ms)
    }

    fn p99_latency(&self) -> f64 {
        self.stat(|s| s.p99_ms)
    }

    fn request_count(&self) -> u64 {
        self.stats.as_ref().map(|s| s.request_count).unwrap_or(0)
    }

    /// The client reports throughput across all concurrent requests.
    fn throughput(&self) -> Option<f64> {
        self.stats.as_ref().and_then(|s| s.throughput)
    }
}

/// Reads the last client statistics block printed by `perf_analyzer`.
pub fn parse_perf_output(stdout: &str) -> Option<LatencyStatistics> {
    let mut count = None;
    let mut throughput = None;
    let mut avg = None;
    let mut std = None;
    let mut p50 = None;
    let mut p90 = None;
    let mut p95 = None;
    let mut p99 = None;

    for line in stdout.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Request count:") {
            count = first_number(rest).map(|c| c as u64);
        } else if let Some(rest) = line.strip_prefix("Throughput:") {
            throughput = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("Avg latency:") {
            avg = first_number(rest);
            std = rest
                .split("standard deviation")
                .nth(1)
                .and_then(first_number);
        } else if let Some(rest) = line.strip_prefix("p50 latency:") {
            p50 = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("p90 latency:") {
            p90 = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("p95 latency:") {
            p95 = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("p99 latency:") {
            p99 = first_number(rest);
        }
    }

    Some(LatencyStatistics {
        avg_ms: avg? / USEC_PER_MS,
        std_ms: std.unwrap_or(0.0) / USEC_PER_MS,
        p50_ms: p50? / USEC_PER_MS,
        p90_ms: p90? / USEC_PER_MS,
        p95_ms: p95? / USEC_PER_MS,
        p99_ms: p99? / USEC_PER_MS,
        request_count: count?,
        throughput,
    })
}

fn first_number(s: &str) -> Option<f64> {
    s.split_whitespace().find_map(|token| {
        token
            .trim_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse::<f64>()
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = "\
*** Measurement Settings ***
  Batch size: 4
  Using \"time_windows\" mode for stabilization

Request concurrency: 2
  Client:
    Request count: 1234
    Throughput: 411.3 infer/sec
    Avg latency: 2428 usec (standard deviation 226 usec)
    p50 latency: 2400 usec
    p90 latency: 2700 usec
    p95 latency: 2900 usec
    p99 latency: 3110 usec
    Avg HTTP time: 2410 usec (send/recv 60 usec + response wait 2350 usec)
  Server:
    Inference count: 4936
    Execution count: 1234
    Successful request count: 1234
    Avg request latency: 2100 usec (overhead 30 usec + queue 20 usec + compute 2050 usec)
";

    #[test]
    fn parses_client_block() {
        let stats = parse_perf_output(SAMPLE_OUTPUT).expect("stats");
        assert_eq!(stats.request_count, 1234);
        assert!((stats.avg_ms - 2.428).abs() < 1e-9);
        assert!((stats.std_ms - 0.226).abs() < 1e-9);
        assert!((stats.p50_ms - 2.4).abs() < 1e-9);
        assert!((stats.p99_ms - 3.11).abs() < 1e-9);
        assert_eq!(stats.throughput, Some(411.3));
    }

    #[test]
    fn incomplete_output_is_rejected() {
        assert!(parse_perf_output("Request count: 3\nAvg latency: 10 usec\n").is_none());
    }

    #[test]
    fn point_config_sets_batch_and_concurrency() {
        let mut base = PerfAnalyzerConfig::new();
        base.set("model-name", "bert").expect("model");
        let runner = PerfAnalyzerRunner::new(
            ExternalTool::new("perf_analyzer"),
            base,
            ProcessOptions::default(),
        );
        let cfg = runner
            .config_for(&SweepPoint {
                batch_size: 4,
                concurrency: 2,
            })
            .expect("cfg");
        assert_eq!(cfg.to_cli_string(), "-m bert -b 4 --concurrency-range=2:2");
        assert_eq!(runner.p99_latency(), 0.0);
    }

    #[test]
    fn sweep_settings_do_not_override_explicit_params() {
        let mut base = PerfAnalyzerConfig::new();
        base.set("max-trials", 20).expect("max-trials");
        let mut runner = PerfAnalyzerRunner::new(
            ExternalTool::new("perf_analyzer"),
            base,
            ProcessOptions::default(),
        );
        runner.configure(&ProfilerConfig {
            measurement_mode: MeasurementMode::TimeWindows,
            measurement_interval_ms: 2000,
            stability_percentage: 5.0,
            ..ProfilerConfig::default()
        });
        assert_eq!(
            runner.base_config().to_cli_string(),
            "--measurement-interval=2000 --stability-percentage=5.0 --max-trials=20"
        );
    }

    #[cfg(unix)]
    #[test]
    fn measure_reads_statistics_from_subprocess() {
        let dir = std::env::temp_dir().join(format!("navigator-pa-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let output = dir.join("output.txt");
        std::fs::write(&output, SAMPLE_OUTPUT).expect("write output");
        let script = dir.join("perf_analyzer.sh");
        std::fs::write(&script, "cat \"$(dirname \"$0\")/output.txt\"\n").expect("write script");

        let tool = ExternalTool::new("sh").with_prefix_args([script.to_string_lossy().to_string()]);
        let mut runner =
            PerfAnalyzerRunner::new(tool, PerfAnalyzerConfig::new(), ProcessOptions::default());
        runner
            .measure(&SweepPoint {
                batch_size: 1,
                concurrency: 1,
            })
            .expect("measure");
        assert_eq!(runner.request_count(), 1234);
        assert!((runner.p95_latency() - 2.9).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_output_is_runner_error() {
        let tool = ExternalTool::new("sh").with_prefix_args(["-c", "echo nothing useful"]);
        let mut runner =
            PerfAnalyzerRunner::new(tool, PerfAnalyzerConfig::new(), ProcessOptions::default());
        let err = runner
            .measure(&SweepPoint {
                batch_size: 1,
                concurrency: 1,
            })
            .expect_err("must fail");
        assert!(matches!(err, NavigatorError::Runner(_)), "got {err:?}");
    }
}
