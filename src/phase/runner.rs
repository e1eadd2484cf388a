//! Drives a module through the phases needed to reach a target.

use super::outcome::{DoneState, Lifecycle, PhaseOutcome};
use crate::context::BuildContext;
use crate::error::{BuildError, PhaseError};
use crate::module::ModuleVariant;
use crate::progress::ProgressEvent;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

/// How a run ended without a fatal error.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RunStatus {
    /// Every planned phase completed.
    Completed,
    /// The module was already done; nothing ran.
    AlreadyDone,
    /// A phase declared the module done early.
    ShortCircuited {
        phase: &'static str,
        state: DoneState,
    },
    /// A phase failed recoverably. The caller decides whether to run the
    /// fallback.
    NeedsFallback {
        phase: &'static str,
        fallback: &'static str,
        #[serde(serialize_with = "serialize_error")]
        error: PhaseError,
    },
}

fn serialize_error<S: serde::Serializer>(error: &PhaseError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&error.to_string())
}

#[derive(Debug, Serialize)]
pub struct PhaseRunResult {
    pub module: String,
    pub target: &'static str,
    pub executed: Vec<&'static str>,
    pub status: RunStatus,
}

impl PhaseRunResult {
    pub fn advisory(&self) -> Option<&str> {
        match &self.status {
            RunStatus::ShortCircuited { state, .. } => state.advisory(),
            _ => None,
        }
    }

    pub fn fallback(&self) -> Option<&'static str> {
        match &self.status {
            RunStatus::NeedsFallback { fallback, .. } => Some(*fallback),
            _ => None,
        }
    }
}

pub struct PhaseRunner;

impl PhaseRunner {
    /// Runs `module` up to `target`, or its default target.
    ///
    /// Phases already completed by earlier runs are not repeated. A failure
    /// with a declared fallback is returned as [`RunStatus::NeedsFallback`];
    /// a failure without one marks the module failed and is returned as an
    /// error.
    pub fn run<M: ModuleVariant>(
        module: &mut M,
        target: Option<&str>,
        ctx: &BuildContext<'_>,
    ) -> Result<PhaseRunResult, BuildError> {
        let graph = M::graph();
        graph.validate().map_err(|source| BuildError::Graph {
            kind: M::KIND.to_string(),
            source,
        })?;

        let name = module.name().to_string();
        let requested = target.unwrap_or_else(|| module.default_target());
        let target = graph
            .get(requested)
            .ok_or_else(|| BuildError::UnknownPhase {
                module: name.clone(),
                phase: requested.to_string(),
            })?
            .name();

        match module.tracker().lifecycle() {
            Lifecycle::Done => {
                debug!(module = %name, "Module already done");
                return Ok(PhaseRunResult {
                    module: name,
                    target,
                    executed: Vec::new(),
                    status: RunStatus::AlreadyDone,
                });
            }
            Lifecycle::Failed => return Err(BuildError::ModuleFailed(name)),
            Lifecycle::NotStarted | Lifecycle::InProgress => {}
        }

        if let Err(e) = module.preflight(ctx) {
            module.tracker_mut().fail();
            ctx.emit(ProgressEvent::ModuleFailed {
                module: name,
                error: e.to_string(),
            });
            return Err(e);
        }

        let plan = graph
            .plan(target, module.tracker().completed())
            .map_err(|source| BuildError::Graph {
                kind: M::KIND.to_string(),
                source,
            })?;

        module.tracker_mut().begin();
        ctx.emit(ProgressEvent::ModuleStarted {
            module: name.clone(),
            target: target.to_string(),
        });

        let started = Instant::now();
        let mut executed = Vec::with_capacity(plan.len());

        for phase in plan {
            ctx.emit(ProgressEvent::PhaseStarted {
                module: name.clone(),
                phase: phase.name().to_string(),
            });
            let phase_started = Instant::now();
            let outcome = phase.invoke(module, ctx);
            executed.push(phase.name());

            match outcome {
                PhaseOutcome::Done => {
                    module.tracker_mut().mark_done(phase);
                    ctx.emit(ProgressEvent::PhaseComplete {
                        module: name.clone(),
                        phase: phase.name().to_string(),
                        duration: phase_started.elapsed(),
                    });
                }
                PhaseOutcome::SkipToDone(state) => {
                    let tracker = module.tracker_mut();
                    tracker.mark_done(phase);
                    tracker.finish(state.advisory().map(str::to_string));
                    ctx.emit(ProgressEvent::ShortCircuited {
                        module: name.clone(),
                        phase: phase.name().to_string(),
                        advisory: state.advisory().map(str::to_string),
                    });
                    ctx.emit(ProgressEvent::ModuleComplete {
                        module: name.clone(),
                        duration: started.elapsed(),
                    });
                    return Ok(PhaseRunResult {
                        module: name,
                        target,
                        executed,
                        status: RunStatus::ShortCircuited {
                            phase: phase.name(),
                            state,
                        },
                    });
                }
                PhaseOutcome::Failed(error) => {
                    // Configuration problems are never retried.
                    let fallback = if error.is_configuration() {
                        None
                    } else {
                        phase.fallbacks().first().copied()
                    };
                    ctx.emit(ProgressEvent::PhaseFailed {
                        module: name.clone(),
                        phase: phase.name().to_string(),
                        error: error.to_string(),
                        fallback: fallback.map(str::to_string),
                    });

                    if let Some(fallback) = fallback {
                        return Ok(PhaseRunResult {
                            module: name,
                            target,
                            executed,
                            status: RunStatus::NeedsFallback {
                                phase: phase.name(),
                                fallback,
                                error,
                            },
                        });
                    }

                    module.tracker_mut().fail();
                    ctx.emit(ProgressEvent::ModuleFailed {
                        module: name.clone(),
                        error: error.to_string(),
                    });
                    return Err(BuildError::PhaseFailed {
                        module: name,
                        phase: phase.name().to_string(),
                        source: error,
                    });
                }
            }
        }

        if target == module.default_target() {
            module.tracker_mut().finish(None);
            ctx.emit(ProgressEvent::ModuleComplete {
                module: name.clone(),
                duration: started.elapsed(),
            });
        }

        Ok(PhaseRunResult {
            module: name,
            target,
            executed,
            status: RunStatus::Completed,
        })
    }
}
