//! Concrete runners.

mod command;
mod perf_analyzer;

pub use command::*;
pub use perf_analyzer::*;
