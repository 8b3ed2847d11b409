//! Runner capability hierarchy.
//!
//! A [`Runner`] executes single inferences and leaves timing to the
//! profiler. A [`StabilizedRunner`] measures a whole sweep point itself and
//! exposes aggregated latency statistics. [`ProfiledRunner`] holds exactly one
//! of the two, so statistics are only reachable on runners that have them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::path::PathBuf;

use crate::{
    CommandRunner, Config, Format, JitType, LatencyStatistics, NavResult, NavigatorError,
    PerfAnalyzerConfig, PerfAnalyzerRunner, Precision, ProcessOptions, RuntimeProvider,
    ProfilerConfig, SweepPoint, TensorSpec,
};

pub trait Runner {
    fn name(&self) -> &str;

    /// Runs one inference over a batch of `batch_size` samples.
    fn infer(&mut self, batch_size: usize) -> NavResult<()>;
}

pub trait StabilizedRunner {
    fn name(&self) -> &str;

    /// Adopts the sweep's stability settings before the first point.
    fn configure(&mut self, _config: &ProfilerConfig) {}

    /// Measures `point` until the runner's own stability criterion holds and
    /// keeps the statistics for the accessors below.
    fn measure(&mut self, point: &SweepPoint) -> NavResult<()>;

    fn avg_latency(&self) -> f64;

    fn std_latency(&self) -> f64;

    fn p50_latency(&self) -> f64;

    fn p90_latency(&self) -> f64;

    fn p95_latency(&self) -> f64;

    fn p99_latency(&self) -> f64;

    fn request_count(&self) -> u64;

    /// Throughput in infer/sec as measured by the runner itself. `None`
    /// means it is derived from batch size and average latency.
    fn throughput(&self) -> Option<f64> {
        None
    }

    fn statistics(&self) -> LatencyStatistics {
        LatencyStatistics {
            avg_ms: self.avg_latency(),
            std_ms: self.std_latency(),
            p50_ms: self.p50_latency(),
            p90_ms: self.p90_latency(),
            p95_ms: self.p95_latency(),
            p99_ms: self.p99_latency(),
            request_count: self.request_count(),
            throughput: self.throughput(),
        }
    }
}

pub enum ProfiledRunner {
    Basic(Box<dyn Runner>),
    Stabilized(Box<dyn StabilizedRunner>),
}

impl ProfiledRunner {
    pub fn basic(runner: impl Runner + 'static) -> Self {
        Self::Basic(Box::new(runner))
    }

    pub fn stabilized(runner: impl StabilizedRunner + 'static) -> Self {
        Self::Stabilized(Box::new(runner))
    }

    /// Answered from the variant alone; never triggers a measurement.
    pub fn is_inference_time_stabilized(&self) -> bool {
        matches!(self, Self::Stabilized(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Basic(r) => r.name(),
            Self::Stabilized(r) => r.name(),
        }
    }
}

/// Serialized runner-selection descriptor, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunnerSpec {
    /// Spawns `program args...` once per inference. `{batch_size}` in an
    /// argument is replaced with the current batch size.
    Command {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        cwd: Option<PathBuf>,
    },
    /// Drives the external `perf_analyzer` against a served model.
    PerfAnalyzer {
        model_name: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        inputs: Vec<TensorSpec>,
        /// Extra `perf_analyzer` keys, validated against the allow-lists.
        #[serde(default)]
        params: serde_json::Map<String, Value>,
    },
    /// In-process framework runtime.
    Framework(FrameworkRunnerSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkRunnerSpec {
    pub format: Format,
    #[serde(default)]
    pub jit_type: Option<JitType>,
    #[serde(default)]
    pub precision: Option<Precision>,
    #[serde(default)]
    pub runtime: Option<RuntimeProvider>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub enable_xla: bool,
    #[serde(default)]
    pub jit_compile: bool,
}

impl RunnerSpec {
    pub fn from_json(raw: &str) -> NavResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Builds the runner. `model_name` fills in a `perf_analyzer` descriptor
    /// that leaves it empty.
    pub fn build(&self, config: &Config, model_name: Option<&str>) -> NavResult<ProfiledRunner> {
        let options = ProcessOptions::new(None, config.process_timeout());
        match self {
            Self::Command { program, args, cwd } => {
                let options = ProcessOptions {
                    cwd: cwd.clone().or_else(|| Some(config.workdir.clone())),
                    ..options
                };
                Ok(ProfiledRunner::basic(CommandRunner::new(
                    crate::ExternalTool::new(program.clone()),
                    args.clone(),
                    options,
                )))
            }
            Self::PerfAnalyzer {
                model_name: spec_model,
                url,
                protocol,
                inputs,
                params,
            } => {
                let name = match (spec_model.is_empty(), model_name) {
                    (true, Some(name)) => name,
                    _ => spec_model.as_str(),
                };
                if name.is_empty() {
                    return Err(NavigatorError::InvalidArgument(
                        "perf_analyzer runner requires a model name".to_string(),
                    ));
                }
                let mut perf = PerfAnalyzerConfig::new();
                perf.set("model-name", name)?;
                if let Some(url) = url {
                    perf.set("url", url.as_str())?;
                }
                if let Some(protocol) = protocol {
                    perf.set("protocol", protocol.as_str())?;
                }
                if !inputs.is_empty() {
                    let shapes = inputs
                        .iter()
                        .map(PerfAnalyzerConfig::shape_param_from_tensor_spec)
                        .collect::<Vec<_>>()
                        .join(" ");
                    perf.set("shape", shapes)?;
                }
                perf.update_config(params.iter().map(|(k, v)| (k, v.clone())))?;
                Ok(ProfiledRunner::stabilized(PerfAnalyzerRunner::new(
                    config.perf_analyzer_tool(),
                    perf,
                    options,
                )))
            }
            Self::Framework(spec) => {
                if spec.format == Format::TensorRt && spec.precision.is_none() {
                    return Err(NavigatorError::InvalidArgument(
                        "trt runner requires a precision".to_string(),
                    ));
                }
                Err(NavigatorError::Unimplemented(format!(
                    "no in-process {} runner is available; profile through a `command` or `perf_analyzer` runner",
                    spec.format
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopRunner;

    impl Runner for NoopRunner {
        fn name(&self) -> &str {
            "noop"
        }

        fn infer(&mut self, _batch_size: usize) -> NavResult<()> {
            Ok(())
        }
    }

    #[test]
    fn capability_comes_from_the_variant() {
        let runner = ProfiledRunner::basic(NoopRunner);
        assert!(!runner.is_inference_time_stabilized());
        assert_eq!(runner.name(), "noop");
    }

    #[test]
    fn perf_analyzer_descriptor_builds_stabilized_runner() {
        let spec = RunnerSpec::from_json(
            r#"{"kind":"perf_analyzer","model_name":"","url":"localhost:8001","params":{"percentile":99}}"#,
        )
        .expect("spec");
        let runner = spec
            .build(&Config::default(), Some("resnet"))
            .expect("runner");
        assert!(runner.is_inference_time_stabilized());
        assert_eq!(runner.name(), "perf_analyzer");
    }

    #[test]
    fn perf_analyzer_descriptor_rejects_unknown_params() {
        let spec = RunnerSpec::from_json(
            r#"{"kind":"perf_analyzer","model_name":"m","params":{"gpus":"all"}}"#,
        )
        .expect("spec");
        let err = spec.build(&Config::default(), None).err().expect("must fail");
        assert!(matches!(err, NavigatorError::Config(_)), "got {err:?}");
    }

    #[test]
    fn framework_runner_is_unimplemented() {
        let spec = RunnerSpec::from_json(
            r#"{"kind":"framework","format":"onnx","runtime":"cuda"}"#,
        )
        .expect("spec");
        let err = spec.build(&Config::default(), None).err().expect("must fail");
        match err {
            NavigatorError::Unimplemented(msg) => assert!(msg.contains("onnx"), "message: {msg}"),
            other => panic!("expected unimplemented, got {other:?}"),
        }
    }

    #[test]
    fn trt_runner_requires_precision() {
        let spec = RunnerSpec::from_json(r#"{"kind":"framework","format":"trt"}"#).expect("spec");
        let err = spec.build(&Config::default(), None).err().expect("must fail");
        assert!(matches!(err, NavigatorError::InvalidArgument(_)));
    }
}
