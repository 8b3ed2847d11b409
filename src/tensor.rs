//! Tensor metadata shared by profiling configs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    /// Full shape, batch dimension first. `-1` marks a dynamic axis.
    pub shape: Vec<i64>,
    #[serde(default)]
    pub dtype: Option<String>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: impl Into<Vec<i64>>) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
            dtype: None,
        }
    }

    /// Shape without the leading batch dimension.
    pub fn sample_shape(&self) -> &[i64] {
        self.shape.get(1..).unwrap_or(&[])
    }
}
