//! End-to-end phase runs through the public API with recorded commands.

use phasebuild::module::XmlContract;
use phasebuild::phase::{PhaseDef, PhaseGraph, PhaseTracker};
use phasebuild::{
    Branch, BuildConfig, BuildContext, BuildError, BuildModule, BuildSession, DependencyKind,
    ExternalDependency, JsonPackageDb, Lifecycle, Module, ModuleVariant, PackageDb, PerlModule,
    PhaseError, PhaseOutcome, RecordingExecutor, RunStatus, StaticPackageIndex, SystemModule,
};
use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tempfile::TempDir;
use yare::parameterized;

const MODULE: &str = "perl-xml-parser";
const PACKAGE: &str = "libxml-parser-perl";

fn config(dir: &Path) -> BuildConfig {
    BuildConfig {
        prefix: dir.join("install"),
        checkoutroot: dir.join("checkout"),
        ..Default::default()
    }
}

fn platform_config(dir: &Path, minimum: &str, recommended: &str) -> BuildConfig {
    let mut config = config(dir);
    config.platform_packages = true;
    config.external_dependencies.insert(
        MODULE.to_string(),
        ExternalDependency {
            minimum: minimum.to_string(),
            recommended: recommended.to_string(),
            package: Some(PACKAGE.to_string()),
        },
    );
    config
}

fn perl_module() -> PerlModule {
    PerlModule::new(
        MODULE,
        Branch::new("https://example.org/XML-Parser.git").with_revision("2.46"),
    )
}

struct Harness {
    _dir: TempDir,
    config: BuildConfig,
    executor: RecordingExecutor,
    db: JsonPackageDb,
    index: StaticPackageIndex,
}

impl Harness {
    fn new(configure: impl FnOnce(&Path) -> BuildConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let config = configure(dir.path());
        Self {
            _dir: dir,
            config,
            executor: RecordingExecutor::new(),
            db: JsonPackageDb::in_memory(),
            index: StaticPackageIndex::new(),
        }
    }

    fn with_executor(mut self, executor: RecordingExecutor) -> Self {
        self.executor = executor;
        self
    }

    fn with_installed(mut self, version: &str) -> Self {
        self.index = StaticPackageIndex::new().with(PACKAGE, version);
        self
    }

    fn session(&self) -> BuildSession<'_> {
        BuildSession::new(BuildContext::new(
            &self.config,
            &self.executor,
            &self.db,
            &self.index,
        ))
    }

    fn ran(&self, prefix: &str) -> bool {
        self.executor.commands().iter().any(|c| c.starts_with(prefix))
    }
}

#[test]
fn test_recent_platform_package_skips_source_build() {
    let harness = Harness::new(|dir| platform_config(dir, "2.40", "2.44")).with_installed("2.46-1");
    let mut module = perl_module();

    let report = harness.session().build(&mut module, None).unwrap();

    assert_eq!(report.executed(), vec!["start"]);
    assert_eq!(report.lifecycle, Lifecycle::Done);
    assert!(report.advisory.is_none());
    assert!(!harness.ran("git"));
    assert!(!harness.ran("make"));
    assert!(harness.db.get(MODULE).is_none());
}

#[test]
fn test_acceptable_platform_package_finishes_with_advisory() {
    let harness = Harness::new(|dir| platform_config(dir, "1.0", "1.6")).with_installed("1.4");
    let mut module = perl_module();

    let report = harness.session().build(&mut module, None).unwrap();

    assert_eq!(report.executed(), vec!["start"]);
    assert_eq!(report.lifecycle, Lifecycle::Done);
    let advisory = report.advisory.as_deref().unwrap();
    assert!(advisory.contains("1.4"));
    assert!(advisory.contains("1.6"));
    assert!(matches!(
        report.runs[0].status,
        RunStatus::ShortCircuited { phase: "start", .. }
    ));
    assert!(!harness.ran("make"));
}

#[test]
fn test_outdated_platform_package_builds_from_source() {
    let harness = Harness::new(|dir| platform_config(dir, "1.2.1", "1.3")).with_installed("1.2");
    let mut module = perl_module();

    let report = harness.session().build(&mut module, None).unwrap();

    assert_eq!(report.executed(), vec!["start", "checkout", "build", "install"]);
    assert!(harness.ran("git clone"));
    assert!(harness.ran("make install"));
    assert_eq!(harness.db.get(MODULE).unwrap().revision, "2.46");
}

#[test]
fn test_missing_requirement_fails_before_any_phase() {
    let harness = Harness::new(|dir| {
        let mut config = config(dir);
        config.platform_packages = true;
        config
    });
    let mut module = perl_module();

    let err = harness.session().build(&mut module, None).unwrap_err();

    assert!(err.is_configuration());
    assert!(harness.executor.commands().is_empty());
    assert_eq!(module.lifecycle(), Lifecycle::Failed);
}

#[test]
fn test_build_failure_reruns_through_force_checkout() {
    let harness = Harness::new(config)
        .with_executor(RecordingExecutor::new().fail_once("make LD_RUN_PATH="));
    let mut module = perl_module();

    let report = harness.session().build(&mut module, None).unwrap();

    assert_eq!(
        report.executed(),
        vec!["start", "checkout", "build", "force_checkout", "build", "install"]
    );
    assert_eq!(report.fallback, Some("force_checkout"));
    assert_eq!(report.lifecycle, Lifecycle::Done);
    assert!(harness.db.get(MODULE).is_some());
}

#[test]
fn test_completed_module_is_not_rebuilt() {
    let harness = Harness::new(config);
    let mut module = perl_module();
    let session = harness.session();

    session.build(&mut module, None).unwrap();
    harness.executor.clear();
    let report = session.build(&mut module, None).unwrap();

    assert!(report.executed().is_empty());
    assert!(matches!(report.runs[0].status, RunStatus::AlreadyDone));
    assert!(harness.executor.commands().is_empty());
}

#[test]
fn test_explicit_target_stops_short() {
    let harness = Harness::new(config);
    let mut module = perl_module();

    let report = harness.session().build(&mut module, Some("checkout")).unwrap();

    assert_eq!(report.executed(), vec!["start", "checkout"]);
    assert_eq!(report.lifecycle, Lifecycle::InProgress);
    assert!(!harness.ran("make"));
}

#[test]
fn test_unknown_target() {
    let harness = Harness::new(config);
    let mut module = perl_module();

    let err = harness.session().build(&mut module, Some("deploy")).unwrap_err();

    assert!(matches!(err, BuildError::UnknownPhase { ref phase, .. } if phase == "deploy"));
    assert_eq!(module.lifecycle(), Lifecycle::NotStarted);
}

#[test]
fn test_system_module_check_runs_probes() {
    let harness = Harness::new(config);
    let mut module =
        SystemModule::create_virtual("pkgconf-glib", DependencyKind::PkgConfig, "glib-2.0");

    let report = harness.session().build(&mut module, None).unwrap();

    assert_eq!(report.executed(), vec!["start", "check"]);
    assert!(harness.ran("pkg-config --exists glib-2.0"));
}

#[parameterized(
    epoch_and_revision = { "2:1.5-3", "1.0", "1.5", true, false },
    between_bounds = { "1.4", "1.0", "1.6", true, true },
    non_numeric = { "1.2.a", "1.2.0", "1.3.0", false, false },
    shorter_prefix = { "1.2", "1.2.1", "1.3", false, false },
)]
fn test_platform_version_decides_build(
    installed: &str,
    minimum: &str,
    recommended: &str,
    skipped: bool,
    advisory: bool,
) {
    let harness =
        Harness::new(|dir| platform_config(dir, minimum, recommended)).with_installed(installed);
    let mut module = perl_module();

    let report = harness.session().build(&mut module, None).unwrap();

    assert_eq!(!harness.ran("make"), skipped);
    assert_eq!(report.advisory.is_some(), advisory);
    assert_eq!(report.lifecycle, Lifecycle::Done);
}

/// A -> B with B falling back to A'. B fails `b_failures` times.
struct Chain {
    tracker: PhaseTracker,
    a_runs: AtomicUsize,
    a_prime_runs: AtomicUsize,
    b_failures: AtomicUsize,
}

impl Chain {
    fn new(b_failures: usize) -> Self {
        Self {
            tracker: PhaseTracker::new(),
            a_runs: AtomicUsize::new(0),
            a_prime_runs: AtomicUsize::new(0),
            b_failures: AtomicUsize::new(b_failures),
        }
    }

    fn a(&self, _ctx: &BuildContext<'_>) -> PhaseOutcome {
        self.a_runs.fetch_add(1, Ordering::SeqCst);
        PhaseOutcome::Done
    }

    fn a_prime(&self, _ctx: &BuildContext<'_>) -> PhaseOutcome {
        self.a_prime_runs.fetch_add(1, Ordering::SeqCst);
        PhaseOutcome::Done
    }

    fn b(&self, _ctx: &BuildContext<'_>) -> PhaseOutcome {
        let left = self.b_failures.load(Ordering::SeqCst);
        if left == 0 {
            return PhaseOutcome::Done;
        }
        self.b_failures.store(left - 1, Ordering::SeqCst);
        PhaseOutcome::Failed(PhaseError::Other("b failed".to_string()))
    }
}

impl Module for Chain {
    fn name(&self) -> &str {
        "chain"
    }

    fn dependencies(&self) -> &[String] {
        &[]
    }

    fn default_target(&self) -> &'static str {
        "b"
    }

    fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut PhaseTracker {
        &mut self.tracker
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ModuleVariant for Chain {
    const KIND: &'static str = "chain";

    fn graph() -> &'static PhaseGraph<Self> {
        static GRAPH: OnceLock<PhaseGraph<Chain>> = OnceLock::new();
        GRAPH.get_or_init(|| {
            PhaseGraph::builder("chain")
                .phase(PhaseDef::new("a", Chain::a))
                .phase(PhaseDef::new("a_prime", Chain::a_prime))
                .phase(PhaseDef::new("b", Chain::b).requires(&["a"]).on_error(&["a_prime"]))
                .build()
        })
    }

    fn xml_contract() -> XmlContract {
        XmlContract {
            tag: "chain",
            attributes: &[],
        }
    }
}

#[test]
fn test_fallback_runs_once_then_target_retries() {
    let harness = Harness::new(config);
    let mut chain = Chain::new(1);

    let report = harness.session().build(&mut chain, None).unwrap();

    assert_eq!(report.executed(), vec!["a", "b", "a_prime", "b"]);
    assert_eq!(chain.a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(chain.a_prime_runs.load(Ordering::SeqCst), 1);
    assert_eq!(chain.lifecycle(), Lifecycle::Done);
}

#[test]
fn test_repeated_failure_after_fallback_is_fatal() {
    let harness = Harness::new(config);
    let mut chain = Chain::new(2);

    let err = harness.session().build(&mut chain, None).unwrap_err();

    assert!(matches!(err, BuildError::PhaseFailed { ref phase, .. } if phase == "b"));
    assert_eq!(chain.a_prime_runs.load(Ordering::SeqCst), 1);
    assert_eq!(chain.lifecycle(), Lifecycle::Failed);
}

#[test]
fn test_chain_kind_is_exposed() {
    let chain = Chain::new(0);
    let phases: Vec<_> = chain.phases().into_iter().map(|p| p.name).collect();
    assert_eq!(chain.kind(), "chain");
    assert_eq!(phases, vec!["a", "a_prime", "b"]);
}
