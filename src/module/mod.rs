//! Module variants and the traits the runner and session work through.
//!
//! A variant supplies its phase table once per type ([`ModuleVariant::graph`])
//! and per-instance data through [`Module`]. [`BuildModule`] is the
//! object-safe face used by module sets and sessions.

pub mod branch;
pub mod perl;
pub mod registry;
pub mod system;

pub use branch::Branch;
pub use perl::PerlModule;
pub use registry::{ModuleParser, ModuleTypeRegistry};
pub use system::{DependencyKind, SystemDependency, SystemModule};

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::phase::{Lifecycle, PhaseGraph, PhaseRunResult, PhaseRunner, PhaseTracker};
use serde::Serialize;
use std::any::Any;

/// Per-instance data every module exposes.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    /// Names of modules that must be built first.
    fn dependencies(&self) -> &[String];

    /// Phase a run aims for when no target is given.
    fn default_target(&self) -> &'static str;

    fn tracker(&self) -> &PhaseTracker;

    fn tracker_mut(&mut self) -> &mut PhaseTracker;

    /// Checked before any phase of a run executes.
    fn preflight(&self, _ctx: &BuildContext<'_>) -> Result<(), BuildError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// A module type with a static phase table.
pub trait ModuleVariant: Module + Sized + 'static {
    /// Element name in moduleset files.
    const KIND: &'static str;

    fn graph() -> &'static PhaseGraph<Self>;

    fn xml_contract() -> XmlContract;
}

/// Object-safe view over any [`ModuleVariant`].
pub trait BuildModule: Module {
    fn kind(&self) -> &'static str;

    fn phases(&self) -> Vec<PhaseInfo>;

    fn run(
        &mut self,
        target: Option<&str>,
        ctx: &BuildContext<'_>,
    ) -> Result<PhaseRunResult, BuildError>;

    fn lifecycle(&self) -> Lifecycle {
        self.tracker().lifecycle()
    }

    fn advisory(&self) -> Option<&str> {
        self.tracker().advisory()
    }

    fn reset(&mut self) {
        self.tracker_mut().reset();
    }
}

impl<M: ModuleVariant> BuildModule for M {
    fn kind(&self) -> &'static str {
        M::KIND
    }

    fn phases(&self) -> Vec<PhaseInfo> {
        M::graph()
            .phases()
            .map(|p| PhaseInfo {
                name: p.name(),
                prerequisites: p.prerequisites().to_vec(),
                fallbacks: p.fallbacks().to_vec(),
                provides: p.provided().to_vec(),
                completed: self.tracker().is_done(p.name()),
            })
            .collect()
    }

    fn run(
        &mut self,
        target: Option<&str>,
        ctx: &BuildContext<'_>,
    ) -> Result<PhaseRunResult, BuildError> {
        PhaseRunner::run(self, target, ctx)
    }
}

/// Description of one phase, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseInfo {
    pub name: &'static str,
    pub prerequisites: Vec<&'static str>,
    pub fallbacks: Vec<&'static str>,
    pub provides: Vec<&'static str>,
    pub completed: bool,
}

/// Attributes a module element accepts in a moduleset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XmlContract {
    pub tag: &'static str,
    pub attributes: &'static [XmlAttribute],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XmlAttribute {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
}

impl XmlAttribute {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, default: Option<&'static str>) -> Self {
        Self {
            name,
            required: false,
            default,
        }
    }
}

impl XmlContract {
    pub fn attribute(&self, name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}
