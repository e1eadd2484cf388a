//! Build session: runs modules to their targets, handling fallback phases.

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::module::{BuildModule, Module};
use crate::moduleset::ModuleSet;
use crate::phase::{Lifecycle, PhaseRunResult, RunStatus};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of building one module.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub module: String,
    pub lifecycle: Lifecycle,
    pub advisory: Option<String>,
    /// Fallback phase that had to run, if any.
    pub fallback: Option<&'static str>,
    pub runs: Vec<PhaseRunResult>,
}

impl BuildReport {
    fn new(module: &dyn BuildModule, runs: Vec<PhaseRunResult>) -> Self {
        let fallback = runs.iter().find_map(PhaseRunResult::fallback);
        Self {
            module: module.name().to_string(),
            lifecycle: module.lifecycle(),
            advisory: module.advisory().map(str::to_string),
            fallback,
            runs,
        }
    }

    pub fn executed(&self) -> Vec<&'static str> {
        self.runs
            .iter()
            .flat_map(|r| r.executed.iter().copied())
            .collect()
    }
}

pub struct BuildSession<'a> {
    ctx: BuildContext<'a>,
}

impl<'a> BuildSession<'a> {
    pub fn new(ctx: BuildContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BuildContext<'a> {
        &self.ctx
    }

    /// Runs `module` to `target` (or its default target).
    ///
    /// A recoverable failure runs the suggested fallback phase once, then
    /// retries the target once. Anything failing after that is fatal.
    pub fn build(
        &self,
        module: &mut dyn BuildModule,
        target: Option<&str>,
    ) -> Result<BuildReport, BuildError> {
        let first = module.run(target, &self.ctx)?;
        let (failed_phase, fallback) = match first.status {
            RunStatus::NeedsFallback {
                phase, fallback, ..
            } => (phase, fallback),
            _ => return Ok(BuildReport::new(module, vec![first])),
        };

        info!(
            module = module.name(),
            phase = failed_phase,
            fallback,
            "Running fallback phase"
        );
        let recovery = module.run(Some(fallback), &self.ctx)?;
        match recovery.status {
            RunStatus::NeedsFallback { .. } => {
                module.tracker_mut().fail();
                return Err(BuildError::FallbackFailed {
                    module: module.name().to_string(),
                    phase: failed_phase.to_string(),
                    fallback: fallback.to_string(),
                });
            }
            RunStatus::ShortCircuited { .. } | RunStatus::AlreadyDone => {
                return Ok(BuildReport::new(module, vec![first, recovery]));
            }
            RunStatus::Completed => {}
        }

        let retry = module.run(target, &self.ctx)?;
        if let RunStatus::NeedsFallback { phase, error, .. } = retry.status {
            warn!(module = module.name(), phase, "Phase failed again after fallback");
            module.tracker_mut().fail();
            return Err(BuildError::PhaseFailed {
                module: module.name().to_string(),
                phase: phase.to_string(),
                source: error,
            });
        }

        Ok(BuildReport::new(module, vec![first, recovery, retry]))
    }

    /// Builds `names` in order, stopping at the first fatal error.
    pub fn build_all(
        &self,
        modules: &mut ModuleSet,
        names: &[String],
        target: Option<&str>,
    ) -> Result<Vec<BuildReport>, BuildError> {
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            let module = modules.get_mut(name).ok_or_else(|| {
                BuildError::Configuration(format!("module '{}' is not in the moduleset", name))
            })?;
            reports.push(self.build(module.as_mut(), target)?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::context::{JsonPackageDb, PackageDb, RecordingExecutor, StaticPackageIndex};
    use crate::module::{Branch, PerlModule};
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &Path) -> BuildConfig {
        BuildConfig {
            prefix: dir.join("install"),
            checkoutroot: dir.join("checkout"),
            ..Default::default()
        }
    }

    fn module() -> PerlModule {
        PerlModule::new("perl-uri", Branch::new("https://example.org/uri.git"))
    }

    fn build_with(executor: RecordingExecutor) -> (TempDir, Result<BuildReport, BuildError>, PerlModule, JsonPackageDb) {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let db = JsonPackageDb::in_memory();
        let index = StaticPackageIndex::new();
        let session = BuildSession::new(BuildContext::new(&config, &executor, &db, &index));

        let mut module = module();
        let result = session.build(&mut module, None);
        (dir, result, module, db)
    }

    #[test]
    fn test_build_without_failures() {
        let (_dir, result, _module, db) = build_with(RecordingExecutor::new());
        let report = result.unwrap();
        assert_eq!(report.executed(), vec!["start", "checkout", "build", "install"]);
        assert_eq!(report.lifecycle, Lifecycle::Done);
        assert!(report.fallback.is_none());
        assert!(db.get("perl-uri").is_some());
    }

    #[test]
    fn test_build_failure_recovers_through_force_checkout() {
        let (_dir, result, _module, db) =
            build_with(RecordingExecutor::new().fail_once("make LD_RUN_PATH="));
        let report = result.unwrap();
        assert_eq!(report.fallback, Some("force_checkout"));
        assert_eq!(
            report.executed(),
            vec!["start", "checkout", "build", "force_checkout", "build", "install"]
        );
        assert_eq!(report.lifecycle, Lifecycle::Done);
        assert!(db.get("perl-uri").is_some());
    }

    #[test]
    fn test_second_failure_is_fatal() {
        let (_dir, result, module, db) =
            build_with(RecordingExecutor::new().fail_on("make LD_RUN_PATH="));
        let err = result.unwrap_err();
        assert!(matches!(err, BuildError::PhaseFailed { ref phase, .. } if phase == "build"));
        assert_eq!(module.tracker().lifecycle(), Lifecycle::Failed);
        assert!(db.get("perl-uri").is_none());
    }

    #[test]
    fn test_fallback_failure_is_fatal() {
        let (_dir, result, module, _db) = build_with(RecordingExecutor::new().fail_on("git clone"));
        let err = result.unwrap_err();
        assert!(
            matches!(err, BuildError::PhaseFailed { ref phase, .. } if phase == "force_checkout")
        );
        assert_eq!(module.tracker().lifecycle(), Lifecycle::Failed);
    }

    #[test]
    fn test_build_all_unknown_module() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let executor = RecordingExecutor::new();
        let db = JsonPackageDb::in_memory();
        let index = StaticPackageIndex::new();
        let session = BuildSession::new(BuildContext::new(&config, &executor, &db, &index));

        let mut set = ModuleSet::new();
        set.insert(Box::new(module())).unwrap();
        let err = session
            .build_all(&mut set, &["perl-xml".to_string()], None)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_build_all_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let executor = RecordingExecutor::new();
        let db = JsonPackageDb::in_memory();
        let index = StaticPackageIndex::new();
        let session = BuildSession::new(BuildContext::new(&config, &executor, &db, &index));

        let mut set = ModuleSet::new();
        set.insert(Box::new(module())).unwrap();
        set.insert(Box::new(PerlModule::new(
            "perl-xml-parser",
            Branch::new("https://example.org/XML-Parser.git"),
        )))
        .unwrap();

        let names = vec!["perl-xml-parser".to_string(), "perl-uri".to_string()];
        let reports = session.build_all(&mut set, &names, None).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].module, "perl-xml-parser");
        assert!(reports.iter().all(|r| r.lifecycle == Lifecycle::Done));
    }
}
