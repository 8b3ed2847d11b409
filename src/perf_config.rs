//! Arguments for the external `perf_analyzer` binary.
//!
//! Keys live in three disjoint namespaces: long-form arguments rendered as
//! `--name=value`, short CLI options rendered as `-x value`, and verbosity
//! flags rendered bare. Each namespace renders in its declaration order.
//! An unset (or falsy) entry keeps the tool's own default and is omitted.

use serde_json::Value;

use std::collections::BTreeMap;

use crate::{CliConfig, NavResult, NavigatorError, TensorSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PerfArg {
    Async,
    Sync,
    MeasurementInterval,
    ConcurrencyRange,
    RequestRateRange,
    RequestDistribution,
    RequestIntervals,
    BinarySearch,
    NumOfSequence,
    LatencyThreshold,
    MaxThreads,
    StabilityPercentage,
    MaxTrials,
    Percentile,
    InputData,
    SharedMemory,
    OutputSharedMemorySize,
    Shape,
    SequenceLength,
    StringLength,
    StringData,
}

impl PerfArg {
    pub const ALL: [PerfArg; 21] = [
        Self::Async,
        Self::Sync,
        Self::MeasurementInterval,
        Self::ConcurrencyRange,
        Self::RequestRateRange,
        Self::RequestDistribution,
        Self::RequestIntervals,
        Self::BinarySearch,
        Self::NumOfSequence,
        Self::LatencyThreshold,
        Self::MaxThreads,
        Self::StabilityPercentage,
        Self::MaxTrials,
        Self::Percentile,
        Self::InputData,
        Self::SharedMemory,
        Self::OutputSharedMemorySize,
        Self::Shape,
        Self::SequenceLength,
        Self::StringLength,
        Self::StringData,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Async => "async",
            Self::Sync => "sync",
            Self::MeasurementInterval => "measurement-interval",
            Self::ConcurrencyRange => "concurrency-range",
            Self::RequestRateRange => "request-rate-range",
            Self::RequestDistribution => "request-distribution",
            Self::RequestIntervals => "request-intervals",
            Self::BinarySearch => "binary-search",
            Self::NumOfSequence => "num-of-sequence",
            Self::LatencyThreshold => "latency-threshold",
            Self::MaxThreads => "max-threads",
            Self::StabilityPercentage => "stability-percentage",
            Self::MaxTrials => "max-trials",
            Self::Percentile => "percentile",
            Self::InputData => "input-data",
            Self::SharedMemory => "shared-memory",
            Self::OutputSharedMemorySize => "output-shared-memory-size",
            Self::Shape => "shape",
            Self::SequenceLength => "sequence-length",
            Self::StringLength => "string-length",
            Self::StringData => "string-data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PerfOption {
    ModelName,
    ModelVersion,
    BatchSize,
    Url,
    Protocol,
    LatencyReportFile,
    Streaming,
    Concurrency,
    Threads,
}

impl PerfOption {
    pub const ALL: [PerfOption; 9] = [
        Self::ModelName,
        Self::ModelVersion,
        Self::BatchSize,
        Self::Url,
        Self::Protocol,
        Self::LatencyReportFile,
        Self::Streaming,
        Self::Concurrency,
        Self::Threads,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ModelName => "model-name",
            Self::ModelVersion => "model-version",
            Self::BatchSize => "batch-size",
            Self::Url => "url",
            Self::Protocol => "protocol",
            Self::LatencyReportFile => "latency-report-file",
            Self::Streaming => "streaming",
            Self::Concurrency => "concurrency",
            Self::Threads => "threads",
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Self::ModelName => "-m",
            Self::ModelVersion => "-x",
            Self::BatchSize => "-b",
            Self::Url => "-u",
            Self::Protocol => "-i",
            Self::LatencyReportFile => "-f",
            Self::Streaming => "-H",
            Self::Concurrency => "-c",
            Self::Threads => "-t",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PerfVerbose {
    Verbose,
    ExtraVerbose,
}

impl PerfVerbose {
    pub const ALL: [PerfVerbose; 2] = [Self::Verbose, Self::ExtraVerbose];

    pub fn name(self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::ExtraVerbose => "extra-verbose",
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Self::Verbose => "-v",
            Self::ExtraVerbose => "-v -v",
        }
    }
}

/// A key resolved to exactly one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfKey {
    Arg(PerfArg),
    Option(PerfOption),
    Verbose(PerfVerbose),
}

impl PerfKey {
    pub fn parse(key: &str) -> Option<Self> {
        if let Some(arg) = PerfArg::ALL.into_iter().find(|a| a.name() == key) {
            return Some(Self::Arg(arg));
        }
        if let Some(opt) = PerfOption::ALL.into_iter().find(|o| o.name() == key) {
            return Some(Self::Option(opt));
        }
        PerfVerbose::ALL
            .into_iter()
            .find(|v| v.name() == key)
            .map(Self::Verbose)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Arg(a) => a.name(),
            Self::Option(o) => o.name(),
            Self::Verbose(v) => v.name(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfAnalyzerConfig {
    args: BTreeMap<PerfArg, Value>,
    options: BTreeMap<PerfOption, Value>,
    verbose: BTreeMap<PerfVerbose, Value>,
}

impl PerfAnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key accepted by [`PerfAnalyzerConfig::set`].
    pub fn allowed_keys() -> Vec<&'static str> {
        PerfArg::ALL
            .into_iter()
            .map(PerfArg::name)
            .chain(PerfOption::ALL.into_iter().map(PerfOption::name))
            .chain(PerfVerbose::ALL.into_iter().map(PerfVerbose::name))
            .collect()
    }

    /// Shape argument for one input: `name:d1,d2,...` without the batch axis.
    pub fn shape_param_from_tensor_spec(spec: &TensorSpec) -> String {
        let dims = spec
            .sample_shape()
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}:{dims}", spec.name)
    }

    /// Applies `params` in iteration order. Stops at the first unsupported
    /// key; keys before it stay applied.
    pub fn update_config<I, K, V>(&mut self, params: I) -> NavResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in params {
            self.set(key.as_ref(), value)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> NavResult<Option<&Value>> {
        match PerfKey::parse(key) {
            Some(k) => Ok(self.get_key(k)),
            None => Err(NavigatorError::Config(format!(
                "'{key}' Key not found in config"
            ))),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> NavResult<()> {
        let Some(k) = PerfKey::parse(key) else {
            return Err(NavigatorError::Config(format!(
                "The argument '{key}' to the perf_analyzer is not supported by the model analyzer."
            )));
        };
        self.set_key(k, value);
        Ok(())
    }

    pub fn get_key(&self, key: PerfKey) -> Option<&Value> {
        match key {
            PerfKey::Arg(a) => self.args.get(&a),
            PerfKey::Option(o) => self.options.get(&o),
            PerfKey::Verbose(v) => self.verbose.get(&v),
        }
    }

    /// Setting `null` returns the key to its unset state.
    pub fn set_key(&mut self, key: PerfKey, value: impl Into<Value>) {
        let value = value.into();
        match key {
            PerfKey::Arg(a) => put(&mut self.args, a, value),
            PerfKey::Option(o) => put(&mut self.options, o, value),
            PerfKey::Verbose(v) => put(&mut self.verbose, v, value),
        }
    }

    pub fn set_arg(&mut self, arg: PerfArg, value: impl Into<Value>) {
        self.set_key(PerfKey::Arg(arg), value);
    }

    pub fn set_option(&mut self, option: PerfOption, value: impl Into<Value>) {
        self.set_key(PerfKey::Option(option), value);
    }

    pub fn set_verbose(&mut self, flag: PerfVerbose, on: bool) {
        self.set_key(PerfKey::Verbose(flag), on);
    }

    /// Set keys and their values, args first, then options, then verbosity.
    pub fn to_params(&self) -> serde_json::Map<String, Value> {
        let mut out = serde_json::Map::new();
        for (k, v) in &self.args {
            out.insert(k.name().to_string(), v.clone());
        }
        for (k, v) in &self.options {
            out.insert(k.name().to_string(), v.clone());
        }
        for (k, v) in &self.verbose {
            out.insert(k.name().to_string(), v.clone());
        }
        out
    }

    /// Arguments for `perf_analyzer`, without the executable name: options,
    /// then verbosity flags, then long-form arguments.
    pub fn to_cli_string(&self) -> String {
        let mut parts = Vec::new();
        for (opt, value) in &self.options {
            if is_truthy(value) {
                parts.push(format!("{} {}", opt.flag(), render_value(value)));
            }
        }
        for (flag, value) in &self.verbose {
            if is_truthy(value) {
                parts.push(flag.flag().to_string());
            }
        }
        for (arg, value) in &self.args {
            if is_truthy(value) {
                parts.push(format!("--{}={}", arg.name(), render_value(value)));
            }
        }
        parts.join(" ")
    }
}

impl CliConfig for PerfAnalyzerConfig {
    fn to_cli_string(&self) -> String {
        PerfAnalyzerConfig::to_cli_string(self)
    }
}

fn put<K: Ord>(map: &mut BTreeMap<K, Value>, key: K, value: Value) {
    if value.is_null() {
        map.remove(&key);
    } else {
        map.insert(key, value);
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
