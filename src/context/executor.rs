//! Command execution for phase bodies.

use crate::error::ExecError;
use std::fmt;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// A command to execute: either a shell string or an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandLine {
    pub fn shell(command: impl Into<String>) -> Self {
        CommandLine::Shell(command.into())
    }

    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Argv(args.into_iter().map(Into::into).collect())
    }

    /// First word of the command, used in diagnostics.
    pub fn program(&self) -> &str {
        match self {
            CommandLine::Shell(cmd) => cmd.split_whitespace().next().unwrap_or(""),
            CommandLine::Argv(args) => args.first().map(String::as_str).unwrap_or(""),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Shell(cmd) => f.write_str(cmd),
            CommandLine::Argv(args) => f.write_str(&args.join(" ")),
        }
    }
}

/// Runs commands on behalf of phase bodies. Calls block until completion.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        command: &CommandLine,
        cwd: Option<&Path>,
        extra_env: &[(String, String)],
    ) -> Result<(), ExecError>;

    /// Runs a command and returns its captured standard output.
    fn capture(&self, command: &CommandLine, cwd: Option<&Path>) -> Result<String, ExecError>;
}

/// Executor backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    fn build(command: &CommandLine) -> Result<Command, ExecError> {
        match command {
            CommandLine::Shell(cmd) => {
                if cmd.trim().is_empty() {
                    return Err(ExecError::EmptyCommand);
                }
                let mut process = Command::new("sh");
                process.arg("-c").arg(cmd);
                Ok(process)
            }
            CommandLine::Argv(args) => {
                let (program, rest) = args.split_first().ok_or(ExecError::EmptyCommand)?;
                let mut process = Command::new(program);
                process.args(rest);
                Ok(process)
            }
        }
    }
}

impl Executor for ProcessExecutor {
    fn execute(
        &self,
        command: &CommandLine,
        cwd: Option<&Path>,
        extra_env: &[(String, String)],
    ) -> Result<(), ExecError> {
        let mut process = Self::build(command)?;
        if let Some(dir) = cwd {
            process.current_dir(dir);
        }
        process.envs(extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        debug!(command = %command, cwd = ?cwd, "Executing");

        let status = process.status().map_err(|source| ExecError::Spawn {
            program: command.program().to_string(),
            source,
        })?;

        if !status.success() {
            return Err(ExecError::ExitStatus {
                command: command.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }

    fn capture(&self, command: &CommandLine, cwd: Option<&Path>) -> Result<String, ExecError> {
        let mut process = Self::build(command)?;
        if let Some(dir) = cwd {
            process.current_dir(dir);
        }

        debug!(command = %command, "Capturing output");

        let output = process.output().map_err(|source| ExecError::Spawn {
            program: command.program().to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(ExecError::ExitStatus {
                command: command.to_string(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
