//! Navigator core library: model export, profiling sweeps and result records.

mod analyzer;
mod cmd;
mod config;
mod error;
mod export;
mod format;
mod perf_config;
mod process;
mod profiler;
mod record;
mod record_set;
mod runner;
mod runtime;
mod statistics;
mod tensor;

pub use analyzer::*;
pub use cmd::*;
pub use config::*;
pub use error::*;
pub use export::*;
pub use format::*;
pub use perf_config::*;
pub use process::*;
pub use profiler::*;
pub use record::*;
pub use record_set::*;
pub use runner::*;
pub use runtime::*;
pub use statistics::*;
pub use tensor::*;
