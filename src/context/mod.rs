//! Collaborators handed to phase bodies: configuration, executor, package
//! database, package index and progress reporting.

pub mod executor;
pub mod index;
pub mod mock;
pub mod packagedb;

pub use executor::{CommandLine, Executor, ProcessExecutor};
pub use index::{AptPackageIndex, PackageIndex, StaticPackageIndex};
pub use mock::{RecordedCommand, RecordingExecutor};
pub use packagedb::{JsonPackageDb, PackageDb, PackageEntry};

use crate::config::BuildConfig;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};

static NO_PROGRESS: NoOpHandler = NoOpHandler;

/// Everything a phase body may touch. Borrowed for the duration of a run.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub config: &'a BuildConfig,
    pub executor: &'a dyn Executor,
    pub packagedb: &'a dyn PackageDb,
    pub index: &'a dyn PackageIndex,
    pub progress: &'a dyn ProgressHandler,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        config: &'a BuildConfig,
        executor: &'a dyn Executor,
        packagedb: &'a dyn PackageDb,
        index: &'a dyn PackageIndex,
    ) -> Self {
        Self {
            config,
            executor,
            packagedb,
            index,
            progress: &NO_PROGRESS,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressHandler) -> Self {
        self.progress = progress;
        self
    }

    /// Reports what a module is currently doing.
    pub fn set_action(&self, action: &str, module: &str) {
        self.progress.on_progress(&ProgressEvent::Action {
            module: module.to_string(),
            action: action.to_string(),
        });
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }
}
