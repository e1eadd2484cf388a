//! Source location of a module and the git operations behind checkout.

use crate::config::BuildConfig;
use crate::context::{BuildContext, CommandLine};
use crate::error::PhaseError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub repo: Option<String>,
    /// Tag, branch or commit to pin the checkout to.
    pub revision: Option<String>,
    /// Directory name under the checkout root; the module name when unset.
    pub checkoutdir: Option<String>,
}

impl Branch {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: Some(repo.into()),
            ..Default::default()
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_checkoutdir(mut self, dir: impl Into<String>) -> Self {
        self.checkoutdir = Some(dir.into());
        self
    }

    pub fn srcdir(&self, config: &BuildConfig, module: &str) -> PathBuf {
        config
            .checkoutroot
            .join(self.checkoutdir.as_deref().unwrap_or(module))
    }

    /// Clones the source, or updates an existing checkout in place.
    pub fn checkout(&self, ctx: &BuildContext<'_>, module: &str) -> Result<(), PhaseError> {
        ctx.set_action("Checking out", module);
        let srcdir = self.srcdir(ctx.config, module);

        if srcdir.exists() {
            debug!(module, srcdir = %srcdir.display(), "Updating existing checkout");
            ctx.executor.execute(
                &CommandLine::argv(["git", "pull", "--ff-only"]),
                Some(&srcdir),
                &[],
            )?;
        } else {
            self.clone_into(ctx, module, &srcdir)?;
        }

        self.pin(ctx, &srcdir)
    }

    /// Discards whatever is on disk and clones afresh.
    pub fn force_checkout(&self, ctx: &BuildContext<'_>, module: &str) -> Result<(), PhaseError> {
        ctx.set_action("Checking out", module);
        let srcdir = self.srcdir(ctx.config, module);

        if srcdir.exists() {
            debug!(module, srcdir = %srcdir.display(), "Removing stale checkout");
            std::fs::remove_dir_all(&srcdir)?;
        }

        self.clone_into(ctx, module, &srcdir)?;
        self.pin(ctx, &srcdir)
    }

    fn clone_into(&self, ctx: &BuildContext<'_>, module: &str, srcdir: &Path) -> Result<(), PhaseError> {
        let repo = self
            .repo
            .as_deref()
            .ok_or_else(|| PhaseError::Other(format!("no repository configured for '{}'", module)))?;

        if let Some(parent) = srcdir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        ctx.executor.execute(
            &CommandLine::argv(["git", "clone", repo, &srcdir.display().to_string()]),
            None,
            &[],
        )?;
        Ok(())
    }

    fn pin(&self, ctx: &BuildContext<'_>, srcdir: &Path) -> Result<(), PhaseError> {
        if let Some(revision) = &self.revision {
            ctx.executor.execute(
                &CommandLine::argv(["git", "checkout", revision.as_str()]),
                Some(srcdir),
                &[],
            )?;
        }
        Ok(())
    }
}
