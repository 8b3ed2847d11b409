//! CLI command implementations. Each returns a JSON value for the logger.

mod analyze_cmd;
mod export_cmd;
mod profile_cmd;
mod results_cmd;

pub use analyze_cmd::*;
pub use export_cmd::*;
pub use profile_cmd::*;
pub use results_cmd::*;
