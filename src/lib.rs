//! phasebuild - phase-driven module builder
//!
//! Modules (Perl distributions, operating-system dependencies) move through
//! named phases such as `checkout`, `build` and `install`. Each module type
//! declares its phases once, with the prerequisites that must run first and
//! the fallback phases to try when one fails. A phase may also finish a module
//! early, which is how an installed platform package that is new enough stands
//! in for a source build.
//!
//! # Example Usage
//!
//! ```no_run
//! use phasebuild::{
//!     BuildConfig, BuildContext, BuildSession, JsonPackageDb, ModuleSet, ModuleTypeRegistry,
//!     ProcessExecutor, StaticPackageIndex,
//! };
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = BuildConfig::resolve(None)?;
//! let registry = ModuleTypeRegistry::with_defaults()?;
//! let mut modules = ModuleSet::load(Path::new("modules.xml"), &registry, &config)?;
//!
//! let executor = ProcessExecutor;
//! let packagedb = JsonPackageDb::open(config.packagedb_path())?;
//! let index = StaticPackageIndex::new();
//! let session = BuildSession::new(BuildContext::new(&config, &executor, &packagedb, &index));
//!
//! for report in session.build_all(&mut modules, &["perl-xml-parser".to_string()], None)? {
//!     println!("{}: {}", report.module, report.lifecycle.as_str());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`phase`]: phase tables, lifecycle tracking and the runner
//! - [`module`]: the `perl` and `systemmodule` variants
//! - [`version`]: lenient version comparison
//! - [`session`]: fallback handling across runs
//! - [`context`]: executor, package database and package index collaborators

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod module;
pub mod moduleset;
pub mod phase;
pub mod progress;
pub mod session;
pub mod util;
pub mod version;

pub use config::{BuildConfig, ConfigError, ExternalDependency};
pub use context::{
    AptPackageIndex, BuildContext, CommandLine, Executor, JsonPackageDb, PackageDb, PackageIndex,
    ProcessExecutor, RecordingExecutor, StaticPackageIndex,
};
pub use error::{BuildError, ExecError, GraphError, PhaseError};
pub use module::{
    Branch, BuildModule, DependencyKind, Module, ModuleTypeRegistry, ModuleVariant, PerlModule,
    SystemModule,
};
pub use moduleset::{ModuleSet, ModulesetError};
pub use phase::{DoneState, Lifecycle, PhaseOutcome, PhaseRunResult, PhaseRunner, RunStatus};
pub use session::{BuildReport, BuildSession};
pub use version::{compare_versions, Satisfaction, VersionTuple};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
