//! Declarative phase tables.
//!
//! Each module type describes its phases once: a name, the phases that must
//! have completed before it, the phases to try when it fails, the phases its
//! success also satisfies, and the body to invoke. The table is validated when
//! it is built so that cycles and dangling references surface before any
//! module runs.

use super::outcome::PhaseOutcome;
use crate::context::BuildContext;
use crate::error::GraphError;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Phase body: reads the module, talks to collaborators, reports an outcome.
pub type PhaseBody<M> = fn(&M, &BuildContext<'_>) -> PhaseOutcome;

pub struct PhaseDef<M> {
    name: &'static str,
    prerequisites: Vec<&'static str>,
    fallbacks: Vec<&'static str>,
    provides: Vec<&'static str>,
    body: PhaseBody<M>,
}

impl<M> PhaseDef<M> {
    pub fn new(name: &'static str, body: PhaseBody<M>) -> Self {
        Self {
            name,
            prerequisites: Vec::new(),
            fallbacks: Vec::new(),
            provides: Vec::new(),
            body,
        }
    }

    pub fn requires(mut self, phases: &[&'static str]) -> Self {
        self.prerequisites.extend_from_slice(phases);
        self
    }

    /// Phases to run, in order of preference, when this one fails recoverably.
    pub fn on_error(mut self, phases: &[&'static str]) -> Self {
        self.fallbacks.extend_from_slice(phases);
        self
    }

    /// Phases that count as completed once this one completes.
    pub fn provides(mut self, phases: &[&'static str]) -> Self {
        self.provides.extend_from_slice(phases);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prerequisites(&self) -> &[&'static str] {
        &self.prerequisites
    }

    pub fn fallbacks(&self) -> &[&'static str] {
        &self.fallbacks
    }

    pub fn provided(&self) -> &[&'static str] {
        &self.provides
    }

    pub fn invoke(&self, module: &M, ctx: &BuildContext<'_>) -> PhaseOutcome {
        (self.body)(module, ctx)
    }
}

impl<M> fmt::Debug for PhaseDef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseDef")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("fallbacks", &self.fallbacks)
            .field("provides", &self.provides)
            .finish()
    }
}

/// Validated phase table for one module type.
pub struct PhaseGraph<M> {
    kind: &'static str,
    phases: Vec<PhaseDef<M>>,
    validity: Result<(), GraphError>,
}

pub struct PhaseGraphBuilder<M> {
    kind: &'static str,
    phases: Vec<PhaseDef<M>>,
}

impl<M> PhaseGraphBuilder<M> {
    pub fn phase(mut self, def: PhaseDef<M>) -> Self {
        self.phases.push(def);
        self
    }

    pub fn build(self) -> PhaseGraph<M> {
        let validity = validate(&self.phases);
        PhaseGraph {
            kind: self.kind,
            phases: self.phases,
            validity,
        }
    }
}

impl<M> PhaseGraph<M> {
    pub fn builder(kind: &'static str) -> PhaseGraphBuilder<M> {
        PhaseGraphBuilder {
            kind,
            phases: Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Result of the construction-time check.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.validity.clone()
    }

    pub fn get(&self, name: &str) -> Option<&PhaseDef<M>> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn phases(&self) -> impl Iterator<Item = &PhaseDef<M>> {
        self.phases.iter()
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|p| p.name).collect()
    }

    /// Orders the phases needed to reach `target`.
    ///
    /// Prerequisites already in `done` are not repeated. The target itself is
    /// always scheduled. Ties between ready phases go to the one declared
    /// first.
    pub fn plan(
        &self,
        target: &str,
        done: &BTreeSet<&'static str>,
    ) -> Result<Vec<&PhaseDef<M>>, GraphError> {
        let target_def = self.get(target).ok_or_else(|| GraphError::UndeclaredPhase {
            phase: self.kind.to_string(),
            missing: target.to_string(),
        })?;

        let mut needed: HashSet<&'static str> = HashSet::new();
        let mut stack = vec![target_def.name];
        while let Some(name) = stack.pop() {
            if !needed.insert(name) {
                continue;
            }
            if let Some(def) = self.get(name) {
                stack.extend(
                    def.prerequisites
                        .iter()
                        .copied()
                        .filter(|p| !done.contains(p)),
                );
            }
        }

        let mut satisfied: HashSet<&'static str> = done.iter().copied().collect();
        let mut pending: Vec<&PhaseDef<M>> = self
            .phases
            .iter()
            .filter(|p| needed.contains(p.name))
            .collect();
        let mut scheduled = Vec::with_capacity(pending.len());

        loop {
            // A phase provided by something scheduled earlier need not run.
            pending.retain(|p| p.name == target_def.name || !satisfied.contains(p.name));
            if pending.is_empty() {
                break;
            }
            let ready = pending
                .iter()
                .position(|p| p.prerequisites.iter().all(|q| satisfied.contains(q)));
            let Some(index) = ready else {
                return Err(GraphError::Cycle(
                    pending.iter().map(|p| p.name.to_string()).collect(),
                ));
            };
            let next = pending.remove(index);
            satisfied.insert(next.name);
            satisfied.extend(next.provides.iter().copied());
            scheduled.push(next);
        }

        Ok(scheduled)
    }
}

impl<M> fmt::Debug for PhaseGraph<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseGraph")
            .field("kind", &self.kind)
            .field("phases", &self.phases)
            .field("validity", &self.validity)
            .finish()
    }
}

fn validate<M>(phases: &[PhaseDef<M>]) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for phase in phases {
        if !seen.insert(phase.name) {
            return Err(GraphError::DuplicatePhase(phase.name.to_string()));
        }
    }

    for phase in phases {
        let references = phase
            .prerequisites
            .iter()
            .chain(&phase.fallbacks)
            .chain(&phase.provides);
        for reference in references {
            if !seen.contains(reference) {
                return Err(GraphError::UndeclaredPhase {
                    phase: phase.name.to_string(),
                    missing: reference.to_string(),
                });
            }
        }
    }

    // Kahn's algorithm over prerequisite edges.
    let mut indegree: HashMap<&str, usize> = phases
        .iter()
        .map(|p| (p.name, p.prerequisites.len()))
        .collect();
    let mut ready: Vec<&str> = phases
        .iter()
        .filter(|p| p.prerequisites.is_empty())
        .map(|p| p.name)
        .collect();
    let mut visited = 0;
    while let Some(name) = ready.pop() {
        visited += 1;
        for phase in phases {
            let edges = phase.prerequisites.iter().filter(|p| **p == name).count();
            if edges == 0 {
                continue;
            }
            if let Some(count) = indegree.get_mut(phase.name) {
                *count -= edges;
                if *count == 0 {
                    ready.push(phase.name);
                }
            }
        }
    }

    if visited < phases.len() {
        let stuck = phases
            .iter()
            .filter(|p| indegree.get(p.name).copied().unwrap_or(0) > 0)
            .map(|p| p.name.to_string())
            .collect();
        return Err(GraphError::Cycle(stuck));
    }

    Ok(())
}
