//! Results of phase bodies and per-module phase bookkeeping.

use super::graph::PhaseDef;
use crate::error::PhaseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// State a short-circuiting phase moves the module to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoneState {
    /// Nothing further is needed.
    Complete,
    /// Done, but a newer version or other follow-up would be preferable.
    Advisory(String),
}

impl DoneState {
    pub fn advisory(&self) -> Option<&str> {
        match self {
            DoneState::Complete => None,
            DoneState::Advisory(reason) => Some(reason),
        }
    }
}

/// What a phase body reports back to the runner.
#[derive(Debug)]
pub enum PhaseOutcome {
    Done,
    Failed(PhaseError),
    /// Mark the module done and skip every remaining phase of this run.
    SkipToDone(DoneState),
}

impl<E> From<Result<(), E>> for PhaseOutcome
where
    E: Into<PhaseError>,
{
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => PhaseOutcome::Done,
            Err(e) => PhaseOutcome::Failed(e.into()),
        }
    }
}

/// Module lifecycle. Moves forward only; `reset` is the sole way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    NotStarted,
    InProgress,
    Done,
    Failed,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::NotStarted => "not-started",
            Lifecycle::InProgress => "in-progress",
            Lifecycle::Done => "done",
            Lifecycle::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Done | Lifecycle::Failed)
    }
}

/// Completed phases and lifecycle of one module.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    lifecycle: Lifecycle,
    completed: BTreeSet<&'static str>,
    advisory: Option<String>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::NotStarted,
            completed: BTreeSet::new(),
            advisory: None,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn completed(&self) -> &BTreeSet<&'static str> {
        &self.completed
    }

    pub fn is_done(&self, phase: &str) -> bool {
        self.completed.contains(phase)
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub(crate) fn begin(&mut self) {
        if self.lifecycle == Lifecycle::NotStarted {
            self.lifecycle = Lifecycle::InProgress;
        }
    }

    pub(crate) fn mark_done<M>(&mut self, phase: &PhaseDef<M>) {
        self.completed.insert(phase.name());
        self.completed.extend(phase.provided());
    }

    pub(crate) fn finish(&mut self, advisory: Option<String>) {
        if !self.lifecycle.is_terminal() {
            self.lifecycle = Lifecycle::Done;
            self.advisory = advisory;
        }
    }

    pub fn fail(&mut self) {
        if !self.lifecycle.is_terminal() {
            self.lifecycle = Lifecycle::Failed;
        }
    }

    /// Explicit re-run request: forget all progress.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
