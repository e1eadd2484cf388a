//! Phase tables, per-module bookkeeping and the runner that walks them.

mod graph;
mod outcome;
mod runner;

pub use graph::{PhaseBody, PhaseDef, PhaseGraph, PhaseGraphBuilder};
pub use outcome::{DoneState, Lifecycle, PhaseOutcome, PhaseTracker};
pub use runner::{PhaseRunResult, PhaseRunner, RunStatus};
