//! Error types shared by the phase runner, module variants and collaborators.

use std::io;
use thiserror::Error;

/// Structural problems in a module variant's phase table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("phase '{0}' is declared more than once")]
    DuplicatePhase(String),

    #[error("phase '{phase}' references undeclared phase '{missing}'")]
    UndeclaredPhase { phase: String, missing: String },

    #[error("prerequisite cycle involving phases: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Failures reported by the command executor.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("command '{command}' exited with {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    ExitStatus { command: String, code: Option<i32> },

    #[error("empty command line")]
    EmptyCommand,
}

/// Failures of the installed-package database.
#[derive(Debug, Error)]
pub enum PackageDbError {
    #[error("package database I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("package database is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("package database lock poisoned")]
    Poisoned,
}

/// Failures of the platform package index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("package '{0}' is not known to the package index")]
    UnknownPackage(String),

    #[error("package '{0}' has no installable candidate")]
    NoCandidate(String),

    #[error("package index query failed: {0}")]
    QueryFailed(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Cause carried by a failed phase outcome.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("no external dependency entry for '{0}'")]
    MissingRequirement(String),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    PackageDb(#[from] PackageDbError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl PhaseError {
    /// Configuration causes are fatal and never trigger a fallback phase.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PhaseError::MissingRequirement(_))
    }
}

/// Fatal outcome of running a module's phases.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid phase graph for module type '{kind}': {source}")]
    Graph {
        kind: String,
        #[source]
        source: GraphError,
    },

    #[error("module '{module}' has no phase named '{phase}'")]
    UnknownPhase { module: String, phase: String },

    #[error("phase '{phase}' of module '{module}' failed: {source}")]
    PhaseFailed {
        module: String,
        phase: String,
        #[source]
        source: PhaseError,
    },

    #[error("fallback phase '{fallback}' of module '{module}' could not recover from failed phase '{phase}'")]
    FallbackFailed {
        module: String,
        phase: String,
        fallback: String,
    },

    #[error("module '{0}' previously failed; reset it before running again")]
    ModuleFailed(String),
}

impl BuildError {
    pub fn is_configuration(&self) -> bool {
        match self {
            BuildError::Configuration(_) | BuildError::Graph { .. } => true,
            BuildError::PhaseFailed { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}
