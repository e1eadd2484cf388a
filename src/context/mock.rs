use super::executor::{CommandLine, Executor};
use crate::error::ExecError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub extra_env: Vec<(String, String)>,
}

/// Executor that records every command instead of running it.
///
/// Commands whose rendered text starts with a registered failure prefix return
/// a non-zero exit status. A failure registered with `fail_once` only fires for
/// the first matching command.
pub struct RecordingExecutor {
    recorded: Mutex<Vec<RecordedCommand>>,
    failures: Mutex<Vec<(String, bool)>>,
    outputs: HashMap<String, String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            recorded: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            outputs: HashMap::new(),
        }
    }

    pub fn fail_on(self, prefix: &str) -> Self {
        self.push_failure(prefix, false);
        self
    }

    pub fn fail_once(self, prefix: &str) -> Self {
        self.push_failure(prefix, true);
        self
    }

    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .map(|r| r.command)
            .collect()
    }

    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.clear();
        }
    }

    fn push_failure(&self, prefix: &str, once: bool) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((prefix.to_string(), once));
        }
    }

    fn check_failure(&self, rendered: &str) -> Result<(), ExecError> {
        let mut failures = match self.failures.lock() {
            Ok(f) => f,
            Err(_) => return Ok(()),
        };

        if let Some(pos) = failures.iter().position(|(p, _)| rendered.starts_with(p.as_str())) {
            if failures[pos].1 {
                failures.remove(pos);
            }
            return Err(ExecError::ExitStatus {
                command: rendered.to_string(),
                code: Some(1),
            });
        }

        Ok(())
    }

    fn record(&self, rendered: &str, cwd: Option<&Path>, extra_env: &[(String, String)]) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedCommand {
                command: rendered.to_string(),
                cwd: cwd.map(Path::to_path_buf),
                extra_env: extra_env.to_vec(),
            });
        }
    }
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for RecordingExecutor {
    fn execute(
        &self,
        command: &CommandLine,
        cwd: Option<&Path>,
        extra_env: &[(String, String)],
    ) -> Result<(), ExecError> {
        let rendered = command.to_string();
        self.record(&rendered, cwd, extra_env);
        self.check_failure(&rendered)
    }

    fn capture(&self, command: &CommandLine, cwd: Option<&Path>) -> Result<String, ExecError> {
        let rendered = command.to_string();
        self.record(&rendered, cwd, &[]);
        self.check_failure(&rendered)?;
        Ok(self.outputs.get(&rendered).cloned().unwrap_or_default())
    }
}
