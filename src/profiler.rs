//! Profiling sweep over batch size and concurrency.
//!
//! Points run serially in a fixed order: for every concurrency level (config
//! order) the batch size escalates in ascending order. A stabilized runner
//! measures each point itself. For a basic runner the profiler times single
//! inferences in trials (measurement windows) until the trailing trial means
//! agree within `stability_percentage`, or `max_trials` is exhausted.

use serde::{Deserialize, Serialize};

use std::path::Path;
use std::time::{Duration, Instant};

use crate::{
    LatencyStatistics, NavResult, NavigatorError, PerfLatency, PerfLatencyAvg, PerfLatencyP50,
    PerfLatencyP90, PerfLatencyP95, PerfLatencyStd, PerfThroughput, ProfiledRunner, RecordSet,
    Runner, StabilityWindow, Throughput,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementMode {
    /// A trial is a fixed number of requests.
    CountWindows,
    /// A trial lasts at least `measurement_interval_ms`.
    TimeWindows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failing point fails the sweep.
    Abort,
    /// Failing points are reported and the sweep moves on.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilerConfig {
    /// Explicit batch sizes; derived from the max batch size when absent.
    #[serde(default)]
    pub batch_sizes: Option<Vec<usize>>,
    #[serde(default = "default_concurrency")]
    pub concurrency: Vec<usize>,
    #[serde(default = "default_measurement_mode")]
    pub measurement_mode: MeasurementMode,
    #[serde(default = "default_request_count")]
    pub measurement_request_count: usize,
    #[serde(default = "default_interval_ms")]
    pub measurement_interval_ms: u64,
    #[serde(default = "default_stability_percentage")]
    pub stability_percentage: f64,
    #[serde(default = "default_stability_window")]
    pub stability_window: usize,
    #[serde(default = "default_max_trials")]
    pub max_trials: usize,
    /// Minimum relative throughput gain required to keep growing the batch.
    #[serde(default = "default_throughput_cutoff")]
    pub throughput_cutoff_threshold: Option<f64>,
    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,
}

fn default_concurrency() -> Vec<usize> {
    vec![1]
}

fn default_measurement_mode() -> MeasurementMode {
    MeasurementMode::CountWindows
}

fn default_request_count() -> usize {
    50
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_stability_percentage() -> f64 {
    10.0
}

fn default_stability_window() -> usize {
    3
}

fn default_max_trials() -> usize {
    10
}

fn default_throughput_cutoff() -> Option<f64> {
    Some(0.05)
}

fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::Abort
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            batch_sizes: None,
            concurrency: default_concurrency(),
            measurement_mode: default_measurement_mode(),
            measurement_request_count: default_request_count(),
            measurement_interval_ms: default_interval_ms(),
            stability_percentage: default_stability_percentage(),
            stability_window: default_stability_window(),
            max_trials: default_max_trials(),
            throughput_cutoff_threshold: default_throughput_cutoff(),
            failure_policy: default_failure_policy(),
        }
    }
}

impl ProfilerConfig {
    pub fn from_json(raw: &str) -> NavResult<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> NavResult<()> {
        let invalid = |msg: &str| Err(NavigatorError::Config(msg.to_string()));
        if self.concurrency.is_empty() || self.concurrency.contains(&0) {
            return invalid("concurrency must list positive values");
        }
        if let Some(sizes) = &self.batch_sizes {
            if sizes.is_empty() || sizes.contains(&0) {
                return invalid("batch_sizes must list positive values");
            }
        }
        if self.measurement_request_count == 0 {
            return invalid("measurement_request_count must be positive");
        }
        if self.stability_window == 0 || self.max_trials == 0 {
            return invalid("stability_window and max_trials must be positive");
        }
        if self.stability_percentage.is_nan() || self.stability_percentage < 0.0 {
            return invalid("stability_percentage must be non-negative");
        }
        Ok(())
    }

    /// Ascending batch sizes for the sweep. Without explicit sizes these are
    /// the powers of two below `max_batch_size` followed by the max itself.
    pub fn batch_sizes_for(&self, max_batch_size: Option<usize>) -> Vec<usize> {
        let mut sizes = match (&self.batch_sizes, max_batch_size) {
            (Some(sizes), Some(max)) => sizes.iter().copied().filter(|b| *b <= max).collect(),
            (Some(sizes), None) => sizes.clone(),
            (None, Some(max)) if max > 0 => {
                let mut out = std::iter::successors(Some(1usize), |b| b.checked_mul(2))
                    .take_while(|b| *b < max)
                    .collect::<Vec<_>>();
                out.push(max);
                out
            }
            (None, _) => vec![1],
        };
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    pub fn sweep_points(&self, max_batch_size: Option<usize>) -> Vec<SweepPoint> {
        let batch_sizes = self.batch_sizes_for(max_batch_size);
        self.concurrency
            .iter()
            .flat_map(|&concurrency| {
                batch_sizes.iter().map(move |&batch_size| SweepPoint {
                    batch_size,
                    concurrency,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub batch_size: usize,
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilingResult {
    pub batch_size: usize,
    pub concurrency: usize,
    pub stable: bool,
    pub trials: usize,
    pub request_count: u64,
    #[serde(flatten)]
    pub records: RecordSet,
}

impl ProfilingResult {
    pub fn point(&self) -> SweepPoint {
        SweepPoint {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointFailure {
    pub point: SweepPoint,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub results: Vec<ProfilingResult>,
    pub failures: Vec<PointFailure>,
}

/// Time source for latency measurement.
pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

pub struct Profiler {
    runner: ProfiledRunner,
    config: ProfilerConfig,
    max_batch_size: Option<usize>,
    clock: Box<dyn Clock>,
    started: Duration,
}

impl Profiler {
    pub fn new(runner: ProfiledRunner, config: ProfilerConfig, max_batch_size: Option<usize>) -> Self {
        Self::with_clock(runner, config, max_batch_size, Box::new(MonotonicClock::default()))
    }

    pub fn with_clock(
        runner: ProfiledRunner,
        config: ProfilerConfig,
        max_batch_size: Option<usize>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let started = clock.now();
        Self {
            runner,
            config,
            max_batch_size,
            clock,
            started,
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn run(&mut self) -> NavResult<SweepOutcome> {
        self.config.validate()?;
        let batch_sizes = self.config.batch_sizes_for(self.max_batch_size);
        if batch_sizes.is_empty() {
            return Err(NavigatorError::Config(format!(
                "no batch size in {:?} fits the max batch size {:?}",
                self.config.batch_sizes.as_deref().unwrap_or_default(),
                self.max_batch_size
            )));
        }
        match &mut self.runner {
            ProfiledRunner::Stabilized(runner) => runner.configure(&self.config),
            ProfiledRunner::Basic(runner) => {
                if let Some(&c) = self.config.concurrency.iter().find(|&&c| c != 1) {
                    return Err(basic_concurrency_error(runner.name(), c));
                }
            }
        }
        let concurrency = self.config.concurrency.clone();
        let mut outcome = SweepOutcome::default();

        tracing::info!(
            runner = self.runner.name(),
            stabilized = self.runner.is_inference_time_stabilized(),
            points = batch_sizes.len() * concurrency.len(),
            "starting profiling sweep"
        );

        for concurrency in concurrency {
            let mut previous: Option<PerfThroughput> = None;
            for &batch_size in &batch_sizes {
                let point = SweepPoint {
                    batch_size,
                    concurrency,
                };
                let result = match self.profile_point(&point) {
                    Ok(result) => result,
                    Err(err) => match self.config.failure_policy {
                        FailurePolicy::Abort => return Err(err),
                        FailurePolicy::Continue => {
                            tracing::warn!(batch_size, concurrency, "profiling point failed: {err}");
                            outcome.failures.push(PointFailure {
                                point,
                                error: err.to_string(),
                            });
                            continue;
                        }
                    },
                };

                let throughput = result.records.get::<Throughput>();
                tracing::info!(
                    batch_size,
                    concurrency,
                    stable = result.stable,
                    trials = result.trials,
                    throughput = throughput.map(|t| t.value()),
                    "profiled point"
                );
                outcome.results.push(result);

                if throughput_saturated(previous, throughput, self.config.throughput_cutoff_threshold) {
                    tracing::info!(batch_size, concurrency, "throughput saturated; stopping batch escalation");
                    break;
                }
                previous = throughput;
            }
        }
        Ok(outcome)
    }

    /// Profiles a single point without the sweep-level failure policy.
    pub fn profile_point(&mut self, point: &SweepPoint) -> NavResult<ProfilingResult> {
        let (stats, stable, trials) = match &mut self.runner {
            ProfiledRunner::Stabilized(runner) => {
                runner.measure(point)?;
                (runner.statistics(), true, 1)
            }
            ProfiledRunner::Basic(runner) => {
                if point.concurrency != 1 {
                    return Err(basic_concurrency_error(runner.name(), point.concurrency));
                }
                measure_basic(runner.as_mut(), point, &self.config, self.clock.as_ref())?
            }
        };
        let timestamp = self.clock.now().saturating_sub(self.started).as_secs_f64();
        Ok(ProfilingResult {
            batch_size: point.batch_size,
            concurrency: point.concurrency,
            stable,
            trials,
            request_count: stats.request_count,
            records: build_records(&stats, point.batch_size, timestamp),
        })
    }
}

/// A basic runner issues one request at a time.
fn basic_concurrency_error(runner: &str, concurrency: usize) -> NavigatorError {
    NavigatorError::Config(format!(
        "runner {runner} runs serially and cannot profile concurrency {concurrency}"
    ))
}

fn measure_basic(
    runner: &mut dyn Runner,
    point: &SweepPoint,
    config: &ProfilerConfig,
    clock: &dyn Clock,
) -> NavResult<(LatencyStatistics, bool, usize)> {
    let mut window = StabilityWindow::new(config.stability_window, config.stability_percentage);
    let mut trials: Vec<Vec<f64>> = Vec::new();
    let mut stable = false;

    while trials.len() < config.max_trials {
        let samples = run_trial(runner, point.batch_size, config, clock)?;
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        trials.push(samples);
        tracing::debug!(
            batch_size = point.batch_size,
            trial = trials.len(),
            mean_latency_ms = mean,
            "trial finished"
        );
        if window.push(mean) {
            stable = true;
            break;
        }
    }

    let keep = config.stability_window.min(trials.len());
    let samples = trials[trials.len() - keep..]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>();
    let stats = LatencyStatistics::from_samples(&samples).ok_or_else(|| {
        NavigatorError::Runner(format!("{} produced no latency samples", runner.name()))
    })?;
    if !stable {
        tracing::warn!(
            batch_size = point.batch_size,
            spread_pct = window.spread_pct(),
            "measurement did not stabilize within {} trials",
            config.max_trials
        );
    }
    Ok((stats, stable, trials.len()))
}

fn run_trial(
    runner: &mut dyn Runner,
    batch_size: usize,
    config: &ProfilerConfig,
    clock: &dyn Clock,
) -> NavResult<Vec<f64>> {
    let mut samples = Vec::new();
    match config.measurement_mode {
        MeasurementMode::CountWindows => {
            for _ in 0..config.measurement_request_count {
                samples.push(timed_infer(runner, batch_size, clock)?);
            }
        }
        MeasurementMode::TimeWindows => {
            let interval = Duration::from_millis(config.measurement_interval_ms);
            let start = clock.now();
            while samples.is_empty() || clock.now().saturating_sub(start) < interval {
                samples.push(timed_infer(runner, batch_size, clock)?);
            }
        }
    }
    Ok(samples)
}

fn timed_infer(runner: &mut dyn Runner, batch_size: usize, clock: &dyn Clock) -> NavResult<f64> {
    let start = clock.now();
    runner.infer(batch_size)?;
    Ok(clock.now().saturating_sub(start).as_secs_f64() * 1000.0)
}

fn build_records(stats: &LatencyStatistics, batch_size: usize, timestamp: f64) -> RecordSet {
    let throughput = match stats.throughput {
        Some(measured) => measured,
        None if stats.avg_ms > 0.0 => batch_size as f64 * 1000.0 / stats.avg_ms,
        None => 0.0,
    };
    let mut set = RecordSet::new();
    set.insert(PerfLatencyAvg::with_timestamp(stats.avg_ms, timestamp));
    set.insert(PerfLatencyStd::with_timestamp(stats.std_ms, timestamp));
    set.insert(PerfLatencyP50::with_timestamp(stats.p50_ms, timestamp));
    set.insert(PerfLatencyP90::with_timestamp(stats.p90_ms, timestamp));
    set.insert(PerfLatencyP95::with_timestamp(stats.p95_ms, timestamp));
    set.insert(PerfLatency::with_timestamp(stats.p99_ms, timestamp));
    set.insert(PerfThroughput::with_timestamp(throughput, timestamp));
    set
}

/// True when `current` improves on `previous` by less than `threshold` of
/// the previous throughput.
fn throughput_saturated(
    previous: Option<PerfThroughput>,
    current: Option<PerfThroughput>,
    threshold: Option<f64>,
) -> bool {
    match (previous, current, threshold) {
        (Some(prev), Some(cur), Some(threshold)) => (cur - prev).value() < threshold * prev.value(),
        _ => false,
    }
}

pub fn save_results(path: &Path, results: &[ProfilingResult]) -> NavResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(results)?)?;
    Ok(())
}

pub fn load_results(path: &Path) -> NavResult<Vec<ProfilingResult>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LatencyP99, StabilizedRunner};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct FakeClock {
        now_us: Rc<Cell<u64>>,
    }

    impl FakeClock {
        fn advance_ms(&self, ms: f64) {
            self.now_us.set(self.now_us.get() + (ms * 1000.0) as u64);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Duration {
            Duration::from_micros(self.now_us.get())
        }
    }

    /// Advances the fake clock by a per-trial latency, one trial per
    /// `per_trial` calls; the last latency repeats once exhausted.
    struct ScriptedRunner {
        clock: FakeClock,
        per_trial: usize,
        latencies_ms: Vec<f64>,
        calls: usize,
        fail_on_batch: Option<usize>,
    }

    impl Runner for ScriptedRunner {
        fn name(&self) -> &str {
            "scripted"
        }

        fn infer(&mut self, batch_size: usize) -> NavResult<()> {
            if self.fail_on_batch == Some(batch_size) {
                return Err(NavigatorError::Runner("boom".to_string()));
            }
            let trial = self.calls / self.per_trial;
            let idx = trial.min(self.latencies_ms.len() - 1);
            self.clock.advance_ms(self.latencies_ms[idx] * batch_size as f64);
            self.calls += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FixedStabilized {
        measured: Vec<SweepPoint>,
        throughput: Option<f64>,
    }

    impl StabilizedRunner for FixedStabilized {
        fn name(&self) -> &str {
            "fixed"
        }

        fn measure(&mut self, point: &SweepPoint) -> NavResult<()> {
            self.measured.push(*point);
            Ok(())
        }

        fn avg_latency(&self) -> f64 {
            10.0
        }

        fn std_latency(&self) -> f64 {
            0.5
        }

        fn p50_latency(&self) -> f64 {
            9.8
        }

        fn p90_latency(&self) -> f64 {
            11.0
        }

        fn p95_latency(&self) -> f64 {
            11.9
        }

        fn p99_latency(&self) -> f64 {
            12.3
        }

        fn request_count(&self) -> u64 {
            50
        }

        fn throughput(&self) -> Option<f64> {
            self.throughput
        }
    }

    fn count_config(per_trial: usize) -> ProfilerConfig {
        ProfilerConfig {
            measurement_request_count: per_trial,
            stability_percentage: 5.0,
            stability_window: 3,
            max_trials: 10,
            throughput_cutoff_threshold: None,
            ..ProfilerConfig::default()
        }
    }

    #[test]
    fn stabilized_runner_reports_its_statistics() {
        let runner = ProfiledRunner::stabilized(FixedStabilized::default());
        let mut profiler = Profiler::new(runner, ProfilerConfig::default(), None);
        let outcome = profiler.run().expect("sweep");
        assert_eq!(outcome.results.len(), 1);
        let result = &outcome.results[0];
        assert!(result.stable);
        assert_eq!(result.request_count, 50);
        let p99 = result
            .records
            .iter()
            .filter(|r| r.tag() == "perf_latency_p99")
            .collect::<Vec<_>>();
        assert_eq!(p99.len(), 1);
        assert_eq!(p99[0].value(), 12.3);
        assert_eq!(result.records.get::<LatencyP99>().map(|r| r.value()), Some(12.3));
        assert_eq!(result.records.get::<Throughput>().map(|r| r.value()), Some(100.0));
    }

    #[test]
    fn measured_throughput_wins_over_latency_estimate() {
        let config = ProfilerConfig {
            concurrency: vec![4],
            ..ProfilerConfig::default()
        };
        let runner = ProfiledRunner::stabilized(FixedStabilized {
            throughput: Some(1647.4),
            ..FixedStabilized::default()
        });
        let outcome = Profiler::new(runner, config, None).run().expect("sweep");
        let result = &outcome.results[0];
        assert_eq!((result.batch_size, result.concurrency), (1, 4));
        // One request in flight would give 1 * 1000 / 10 ms = 100 infer/sec.
        assert_eq!(result.records.get::<Throughput>().map(|r| r.value()), Some(1647.4));
    }

    #[test]
    fn empty_sweep_is_config_error() {
        let config = ProfilerConfig {
            batch_sizes: Some(vec![8, 16]),
            ..ProfilerConfig::default()
        };
        let runner = ProfiledRunner::stabilized(FixedStabilized::default());
        let err = Profiler::new(runner, config.clone(), Some(4))
            .run()
            .expect_err("nothing to sweep");
        assert!(matches!(err, NavigatorError::Config(_)), "got {err:?}");

        // A model without batching only sweeps batch size 1.
        let runner = ProfiledRunner::stabilized(FixedStabilized::default());
        let err = Profiler::new(runner, config, Some(1)).run().expect_err("no batching");
        assert!(matches!(err, NavigatorError::Config(_)), "got {err:?}");
    }

    #[test]
    fn basic_runner_rejects_concurrency_above_one() {
        let clock = FakeClock::default();
        let runner = ScriptedRunner {
            clock: clock.clone(),
            per_trial: 1,
            latencies_ms: vec![1.0],
            calls: 0,
            fail_on_batch: None,
        };
        let config = ProfilerConfig {
            concurrency: vec![1, 2],
            failure_policy: FailurePolicy::Continue,
            ..count_config(1)
        };
        let mut profiler = Profiler::with_clock(
            ProfiledRunner::basic(runner),
            config,
            None,
            Box::new(clock.clone()),
        );
        let err = profiler.run().expect_err("serial runner");
        assert!(matches!(err, NavigatorError::Config(_)), "got {err:?}");
        assert_eq!(clock.now(), Duration::ZERO);

        let err = profiler
            .profile_point(&SweepPoint {
                batch_size: 1,
                concurrency: 3,
            })
            .expect_err("serial runner");
        assert!(matches!(err, NavigatorError::Config(_)), "got {err:?}");
    }

    #[test]
    fn time_windows_fill_each_trial_with_samples() {
        let clock = FakeClock::default();
        // 10 ms per inference in 50 ms windows: five samples per trial.
        let runner = ScriptedRunner {
            clock: clock.clone(),
            per_trial: 5,
            latencies_ms: vec![10.0],
            calls: 0,
            fail_on_batch: None,
        };
        let config = ProfilerConfig {
            measurement_mode: MeasurementMode::TimeWindows,
            measurement_interval_ms: 50,
            ..count_config(1)
        };
        let mut profiler =
            Profiler::with_clock(ProfiledRunner::basic(runner), config, None, Box::new(clock));
        let result = &profiler.run().expect("sweep").results[0];
        assert!(result.stable);
        assert_eq!(result.trials, 3);
        assert_eq!(result.request_count, 15);
    }

    #[test]
    fn time_windows_take_at_least_one_sample_per_trial() {
        let clock = FakeClock::default();
        let runner = ScriptedRunner {
            clock: clock.clone(),
            per_trial: 1,
            latencies_ms: vec![5.0, 10.0, 5.0, 10.0],
            calls: 0,
            fail_on_batch: None,
        };
        let config = ProfilerConfig {
            measurement_mode: MeasurementMode::TimeWindows,
            measurement_interval_ms: 0,
            max_trials: 4,
            ..count_config(1)
        };
        let mut profiler =
            Profiler::with_clock(ProfiledRunner::basic(runner), config, None, Box::new(clock));
        let result = &profiler.run().expect("sweep").results[0];
        assert!(!result.stable);
        assert_eq!(result.trials, 4);
        // The last three single-sample trials feed the records.
        assert_eq!(result.request_count, 3);
    }

    #[test]
    fn basic_runner_becomes_stable_within_window() {
        let clock = FakeClock::default();
        let runner = ScriptedRunner {
            clock: clock.clone(),
            per_trial: 4,
            latencies_ms: vec![30.0, 10.0, 10.2, 9.9],
            calls: 0,
            fail_on_batch: None,
        };
        let mut profiler = Profiler::with_clock(
            ProfiledRunner::basic(runner),
            count_config(4),
            None,
            Box::new(clock),
        );
        let outcome = profiler.run().expect("sweep");
        let result = &outcome.results[0];
        assert!(result.stable);
        assert_eq!(result.trials, 4);
        assert_eq!(result.request_count, 12);
        let p99 = result.records.get::<LatencyP99>().expect("p99").value();
        assert!((p99 - 10.2).abs() < 1e-6, "p99 = {p99}");
    }

    #[test]
    fn basic_runner_reports_unstable_after_max_trials() {
        let clock = FakeClock::default();
        let runner = ScriptedRunner {
            clock: clock.clone(),
            per_trial: 2,
            latencies_ms: vec![5.0, 10.0, 5.0, 10.0, 5.0, 10.0],
            calls: 0,
            fail_on_batch: None,
        };
        let config = ProfilerConfig {
            max_trials: 5,
            ..count_config(2)
        };
        let mut profiler =
            Profiler::with_clock(ProfiledRunner::basic(runner), config, None, Box::new(clock));
        let outcome = profiler.run().expect("sweep");
        assert!(!outcome.results[0].stable);
        assert_eq!(outcome.results[0].trials, 5);
    }

    #[test]
    fn sweep_order_is_concurrency_then_ascending_batch() {
        let config = ProfilerConfig {
            batch_sizes: Some(vec![8, 1, 4, 8]),
            concurrency: vec![2, 1],
            ..ProfilerConfig::default()
        };
        let points = config.sweep_points(Some(4));
        let pairs = points
            .iter()
            .map(|p| (p.concurrency, p.batch_size))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![(2, 1), (2, 4), (1, 1), (1, 4)]);
    }

    #[test]
    fn default_batch_sizes_are_powers_of_two_up_to_max() {
        let config = ProfilerConfig::default();
        assert_eq!(config.batch_sizes_for(Some(12)), vec![1, 2, 4, 8, 12]);
        assert_eq!(config.batch_sizes_for(Some(16)), vec![1, 2, 4, 8, 16]);
        assert_eq!(config.batch_sizes_for(None), vec![1]);
    }

    #[test]
    fn throughput_cutoff_stops_batch_escalation() {
        let clock = FakeClock::default();
        // Latency grows linearly with batch size, so throughput stays flat.
        let runner = ScriptedRunner {
            clock: clock.clone(),
            per_trial: 2,
            latencies_ms: vec![2.0],
            calls: 0,
            fail_on_batch: None,
        };
        let config = ProfilerConfig {
            throughput_cutoff_threshold: Some(0.05),
            ..count_config(2)
        };
        let mut profiler = Profiler::with_clock(
            ProfiledRunner::basic(runner),
            config,
            Some(16),
            Box::new(clock),
        );
        let outcome = profiler.run().expect("sweep");
        let batches = outcome
            .results
            .iter()
            .map(|r| r.batch_size)
            .collect::<Vec<_>>();
        assert_eq!(batches, vec![1, 2]);
    }

    #[test]
    fn failure_policy_controls_partial_failures() {
        let make = |policy| {
            let clock = FakeClock::default();
            let runner = ScriptedRunner {
                clock: clock.clone(),
                per_trial: 1,
                latencies_ms: vec![1.0],
                calls: 0,
                fail_on_batch: Some(2),
            };
            let config = ProfilerConfig {
                batch_sizes: Some(vec![1, 2, 4]),
                failure_policy: policy,
                ..count_config(1)
            };
            Profiler::with_clock(ProfiledRunner::basic(runner), config, None, Box::new(clock))
        };

        let err = make(FailurePolicy::Abort).run().expect_err("abort");
        assert!(matches!(err, NavigatorError::Runner(_)));

        let outcome = make(FailurePolicy::Continue).run().expect("continue");
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].point.batch_size, 2);
        assert!(outcome.failures[0].error.contains("boom"));
    }

    #[test]
    fn config_rejects_unknown_keys_and_bad_values() {
        assert!(ProfilerConfig::from_json(r#"{"max_trials": 3}"#).is_ok());
        assert!(ProfilerConfig::from_json(r#"{"max_trial": 3}"#).is_err());
        let err = ProfilerConfig::from_json(r#"{"concurrency": []}"#).expect_err("empty");
        assert!(matches!(err, NavigatorError::Config(_)));
        let cfg = ProfilerConfig::from_json(r#"{"throughput_cutoff_threshold": null}"#)
            .expect("null cutoff");
        assert_eq!(cfg.throughput_cutoff_threshold, None);
    }

    #[test]
    fn results_file_round_trips() {
        let dir = std::env::temp_dir().join(format!("navigator-results-{}", uuid::Uuid::new_v4()));
        let path = dir.join("results.json");
        let runner = ProfiledRunner::stabilized(FixedStabilized::default());
        let config = ProfilerConfig {
            batch_sizes: Some(vec![1, 2]),
            throughput_cutoff_threshold: None,
            ..ProfilerConfig::default()
        };
        let outcome = Profiler::new(runner, config, None).run().expect("sweep");
        save_results(&path, &outcome.results).expect("save");

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        let first = &raw.as_array().expect("array")[0];
        assert_eq!(first["batch_size"], serde_json::json!(1));
        assert_eq!(first["perf_latency_p99"], serde_json::json!(12.3));

        let loaded = load_results(&path).expect("load");
        assert_eq!(loaded, outcome.results);
    }
}
