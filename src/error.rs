//! Crate-wide error types.

use thiserror::Error;

pub type NavResult<T> = Result<T, NavigatorError>;

#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("running {command} failed with {} : {output}", exit_status_label(.exit_code))]
    Process {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("{command} did not finish within {timeout_secs:.1}s")]
    Timeout { command: String, timeout_secs: f64 },

    #[error("not implemented: {0}")]
    Unimplemented(String),

    #[error("runner error: {0}")]
    Runner(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("time error: {0}")]
    Time(String),
}

/// `exit status 2`, or a note that the process never returned a code
/// (killed by a signal or never started).
fn exit_status_label(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit status {code}"),
        None => "no exit status".to_string(),
    }
}

impl From<time::error::Format> for NavigatorError {
    fn from(value: time::error::Format) -> Self {
        Self::Time(value.to_string())
    }
}
