pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildArgs, CliArgs, Commands, CompareArgs, PhasesArgs};
pub use output::{ComparisonReport, OutputFormat, OutputFormatter, PhaseListing};
