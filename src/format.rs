//! Model serialization formats and runtime selectors.

use serde::{Deserialize, Serialize};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Torchscript,
    Onnx,
    #[serde(rename = "trt")]
    TensorRt,
    Savedmodel,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Torchscript => "torchscript",
            Self::Onnx => "onnx",
            Self::TensorRt => "trt",
            Self::Savedmodel => "savedmodel",
        }
    }

    /// Default artifact name inside a per-format model directory.
    pub fn artifact_name(self) -> &'static str {
        match self {
            Self::Torchscript => "model.pt",
            Self::Onnx => "model.onnx",
            Self::TensorRt => "model.plan",
            Self::Savedmodel => "model.savedmodel",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Torchscript, Self::Onnx, Self::TensorRt, Self::Savedmodel]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitType {
    Script,
    Trace,
}

impl JitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Trace => "trace",
        }
    }
}

impl clap::ValueEnum for JitType {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Script, Self::Trace]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Fp32,
    Fp16,
    Int8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeProvider {
    Cpu,
    Cuda,
    Tensorrt,
}
