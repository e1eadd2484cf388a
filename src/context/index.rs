//! Platform package index queries used by the platform-package `start` phase.

use super::executor::{CommandLine, Executor};
use crate::error::IndexError;
use std::collections::HashMap;
use tracing::debug;

/// Source of currently available versions of platform packages.
#[cfg_attr(test, mockall::automock)]
pub trait PackageIndex: Send + Sync {
    /// Brings the local view of the index up to date.
    fn refresh(&self, executor: &dyn Executor) -> Result<(), IndexError>;

    /// Version string of the installable candidate for `package`.
    fn available_version(&self, executor: &dyn Executor, package: &str) -> Result<String, IndexError>;
}

/// Debian-style index queried through `apt-cache policy`.
#[derive(Debug, Clone)]
pub struct AptPackageIndex {
    /// Run the refresh through `sudo`.
    pub use_sudo: bool,
}

impl Default for AptPackageIndex {
    fn default() -> Self {
        Self { use_sudo: true }
    }
}

impl AptPackageIndex {
    /// Extracts the `Candidate:` version from `apt-cache policy` output.
    pub fn parse_policy(package: &str, output: &str) -> Result<String, IndexError> {
        let candidate = output
            .lines()
            .find_map(|line| line.trim().strip_prefix("Candidate:"))
            .map(str::trim)
            .ok_or_else(|| IndexError::UnknownPackage(package.to_string()))?;

        if candidate.is_empty() || candidate == "(none)" {
            return Err(IndexError::NoCandidate(package.to_string()));
        }

        Ok(candidate.to_string())
    }
}

impl PackageIndex for AptPackageIndex {
    fn refresh(&self, executor: &dyn Executor) -> Result<(), IndexError> {
        let mut args = vec!["apt-get", "update"];
        if self.use_sudo {
            args.insert(0, "sudo");
        }
        executor.execute(&CommandLine::argv(args), None, &[])?;
        Ok(())
    }

    fn available_version(&self, executor: &dyn Executor, package: &str) -> Result<String, IndexError> {
        let output = executor.capture(&CommandLine::argv(["apt-cache", "policy", package]), None)?;
        let version = Self::parse_policy(package, &output)?;
        debug!(package, version = %version, "Resolved candidate version");
        Ok(version)
    }
}

/// Fixed package-to-version map.
#[derive(Debug, Clone, Default)]
pub struct StaticPackageIndex {
    versions: HashMap<String, String>,
}

impl StaticPackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, package: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(package.into(), version.into());
        self
    }

    pub fn insert(&mut self, package: impl Into<String>, version: impl Into<String>) {
        self.versions.insert(package.into(), version.into());
    }
}

impl PackageIndex for StaticPackageIndex {
    fn refresh(&self, _executor: &dyn Executor) -> Result<(), IndexError> {
        Ok(())
    }

    fn available_version(&self, _executor: &dyn Executor, package: &str) -> Result<String, IndexError> {
        self.versions
            .get(package)
            .cloned()
            .ok_or_else(|| IndexError::UnknownPackage(package.to_string()))
    }
}
