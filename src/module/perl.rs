//! Perl modules built with ExtUtils::MakeMaker.
//!
//! Pipeline: `start` → `checkout` → `build` → `install`. Every failure after
//! `start` falls back to `force_checkout`, on the assumption that a broken
//! tree is the likeliest cause. With platform packages enabled, `start` asks
//! the package index first and may finish the module without building.

use super::{Branch, Module, ModuleVariant, XmlAttribute, XmlContract};
use crate::config::BuildConfig;
use crate::context::{BuildContext, CommandLine};
use crate::error::{BuildError, PhaseError};
use crate::moduleset::{self, ModulesetError};
use crate::phase::{DoneState, PhaseDef, PhaseGraph, PhaseOutcome, PhaseTracker};
use crate::version::{compare_versions, Satisfaction};
use roxmltree::Node;
use std::any::Any;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

pub const PHASE_START: &str = "start";
pub const PHASE_CHECKOUT: &str = "checkout";
pub const PHASE_FORCE_CHECKOUT: &str = "force_checkout";
pub const PHASE_BUILD: &str = "build";
pub const PHASE_INSTALL: &str = "install";

#[derive(Debug, Clone)]
pub struct PerlModule {
    name: String,
    branch: Branch,
    /// Module-declared configure arguments, already expanded.
    makeargs: String,
    dependencies: Vec<String>,
    tracker: PhaseTracker,
}

impl PerlModule {
    pub fn new(name: impl Into<String>, branch: Branch) -> Self {
        Self {
            name: name.into(),
            branch,
            makeargs: String::new(),
            dependencies: Vec::new(),
            tracker: PhaseTracker::new(),
        }
    }

    pub fn with_makeargs(mut self, makeargs: impl Into<String>) -> Self {
        self.makeargs = makeargs.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    pub fn makeargs(&self) -> &str {
        &self.makeargs
    }

    pub fn srcdir(&self, config: &BuildConfig) -> PathBuf {
        self.branch.srcdir(config, &self.name)
    }

    /// Always the source directory; MakeMaker builds in tree.
    pub fn builddir(&self, config: &BuildConfig) -> PathBuf {
        self.srcdir(config)
    }

    pub fn revision(&self) -> Option<&str> {
        self.branch.revision.as_deref()
    }

    /// Module-declared arguments followed by the configured ones.
    pub fn effective_makeargs(&self, config: &BuildConfig) -> String {
        [self.makeargs.trim(), config.makeargs_for(&self.name).trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn from_xml(node: Node<'_, '_>, config: &BuildConfig) -> Result<Self, ModulesetError> {
        let name = moduleset::required_attribute(node, "id")?;
        let makeargs = node
            .attribute("makeargs")
            .map(|m| config.expand(m))
            .unwrap_or_default();

        let branch = node
            .children()
            .find(|c| c.has_tag_name("branch"))
            .map(|b| Branch {
                repo: b.attribute("repo").map(str::to_string),
                revision: b.attribute("revision").map(str::to_string),
                checkoutdir: b.attribute("checkoutdir").map(str::to_string),
            })
            .unwrap_or_default();

        Ok(Self::new(name, branch)
            .with_makeargs(makeargs)
            .with_dependencies(moduleset::child_dependencies(node)))
    }

    fn do_start(&self, ctx: &BuildContext<'_>) -> PhaseOutcome {
        if !ctx.config.platform_packages {
            return PhaseOutcome::Done;
        }
        self.check_platform_package(ctx)
    }

    fn check_platform_package(&self, ctx: &BuildContext<'_>) -> PhaseOutcome {
        ctx.set_action("Checking platform package", &self.name);

        let Some(requirement) = ctx.config.external_dependency(&self.name) else {
            return PhaseOutcome::Failed(PhaseError::MissingRequirement(self.name.clone()));
        };
        let package = requirement.package.as_deref().unwrap_or(&self.name);

        let installed = match ctx
            .index
            .refresh(ctx.executor)
            .and_then(|()| ctx.index.available_version(ctx.executor, package))
        {
            Ok(version) => version,
            Err(e) => return PhaseOutcome::Failed(e.into()),
        };

        match compare_versions(&installed, &requirement.minimum, &requirement.recommended) {
            Satisfaction::MeetsRecommended => {
                info!(module = %self.name, package, version = %installed, "Platform package satisfies module");
                PhaseOutcome::SkipToDone(DoneState::Complete)
            }
            Satisfaction::MeetsMinimum => {
                let reason = format!(
                    "{} {} meets minimum {} but {} is recommended",
                    package, installed, requirement.minimum, requirement.recommended
                );
                warn!(module = %self.name, "{}", reason);
                PhaseOutcome::SkipToDone(DoneState::Advisory(reason))
            }
            Satisfaction::BelowMinimum => {
                info!(
                    module = %self.name,
                    package,
                    version = %installed,
                    minimum = %requirement.minimum,
                    "Platform package too old, building from source"
                );
                PhaseOutcome::Done
            }
        }
    }

    fn do_checkout(&self, ctx: &BuildContext<'_>) -> PhaseOutcome {
        self.branch.checkout(ctx, &self.name).into()
    }

    fn do_force_checkout(&self, ctx: &BuildContext<'_>) -> PhaseOutcome {
        self.branch.force_checkout(ctx, &self.name).into()
    }

    fn do_build(&self, ctx: &BuildContext<'_>) -> PhaseOutcome {
        self.build(ctx).into()
    }

    fn build(&self, ctx: &BuildContext<'_>) -> Result<(), PhaseError> {
        ctx.set_action("Building", &self.name);
        let config = ctx.config;
        let builddir = self.builddir(config);
        let env = config.extra_env_for(&self.name);

        let mut configure = format!(
            "{} Makefile.PL INSTALLDIRS=vendor PREFIX={}",
            config.tools.perl,
            config.prefix.display()
        );
        let makeargs = self.effective_makeargs(config);
        if !makeargs.is_empty() {
            configure.push(' ');
            configure.push_str(&makeargs);
        }

        ctx.executor
            .execute(&CommandLine::shell(configure), Some(&builddir), &env)?;
        ctx.executor.execute(
            &CommandLine::argv([config.tools.make.as_str(), "LD_RUN_PATH="]),
            Some(&builddir),
            &env,
        )?;
        Ok(())
    }

    fn do_install(&self, ctx: &BuildContext<'_>) -> PhaseOutcome {
        self.install(ctx).into()
    }

    fn install(&self, ctx: &BuildContext<'_>) -> Result<(), PhaseError> {
        ctx.set_action("Installing", &self.name);
        let config = ctx.config;

        ctx.executor.execute(
            &CommandLine::argv([
                config.tools.make.clone(),
                "install".to_string(),
                format!("PREFIX={}", config.prefix.display()),
            ]),
            Some(&self.builddir(config)),
            &config.extra_env_for(&self.name),
        )?;
        ctx.packagedb
            .add(&self.name, self.revision().unwrap_or(""))?;
        Ok(())
    }
}

impl Module for PerlModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn default_target(&self) -> &'static str {
        PHASE_INSTALL
    }

    fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut PhaseTracker {
        &mut self.tracker
    }

    fn preflight(&self, ctx: &BuildContext<'_>) -> Result<(), BuildError> {
        if ctx.config.platform_packages && ctx.config.external_dependency(&self.name).is_none() {
            return Err(BuildError::Configuration(format!(
                "platform packages enabled but no external dependency entry for '{}'",
                self.name
            )));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ModuleVariant for PerlModule {
    const KIND: &'static str = "perl";

    fn graph() -> &'static PhaseGraph<Self> {
        static GRAPH: OnceLock<PhaseGraph<PerlModule>> = OnceLock::new();
        GRAPH.get_or_init(|| {
            PhaseGraph::builder(Self::KIND)
                .phase(PhaseDef::new(PHASE_START, Self::do_start))
                .phase(
                    PhaseDef::new(PHASE_CHECKOUT, Self::do_checkout)
                        .requires(&[PHASE_START])
                        .on_error(&[PHASE_FORCE_CHECKOUT]),
                )
                .phase(
                    PhaseDef::new(PHASE_FORCE_CHECKOUT, Self::do_force_checkout)
                        .provides(&[PHASE_CHECKOUT]),
                )
                .phase(
                    PhaseDef::new(PHASE_BUILD, Self::do_build)
                        .requires(&[PHASE_CHECKOUT])
                        .on_error(&[PHASE_FORCE_CHECKOUT]),
                )
                // `build` is listed so that targeting `install` on a fresh
                // module builds before installing.
                .phase(
                    PhaseDef::new(PHASE_INSTALL, Self::do_install)
                        .requires(&[PHASE_CHECKOUT, PHASE_BUILD])
                        .on_error(&[PHASE_FORCE_CHECKOUT]),
                )
                .build()
        })
    }

    fn xml_contract() -> XmlContract {
        const ATTRIBUTES: &[XmlAttribute] = &[
            XmlAttribute::required("id"),
            XmlAttribute::optional("makeargs", Some("")),
        ];
        XmlContract {
            tag: Self::KIND,
            attributes: ATTRIBUTES,
        }
    }
}
