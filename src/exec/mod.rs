//! Command execution against the cluster control plane
//!
//! The reconcilers never talk to the cluster directly. Every read and
//! every mutation is a PowerShell command string handed to a
//! [`CommandExecutor`], which returns the command's text output or a
//! failure.

#[cfg(test)]
pub mod fake;
pub mod feature;
pub mod powershell;

#[cfg(test)]
pub use fake::FakeExecutor;
pub use feature::{ExecutorFeatureInstaller, FeatureInstaller};
pub use powershell::PowerShellExecutor;

use crate::config::Credentials;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Details of a command that ran and exited unsuccessfully
#[derive(Debug)]
pub struct CommandFailureInfo {
    pub command: String,
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for CommandFailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .status
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(f, "Command [{}] executed and failed with status: {}", self.command, status)?;
        if !self.stderr.trim().is_empty() {
            write!(f, "  stderr: {}", self.stderr.trim())?;
        }
        Ok(())
    }
}

/// Executor-level errors
#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to start execution of [{command}]: {err}")]
    ExecutionStart { command: String, err: std::io::Error },

    #[error("{0}")]
    CommandFailure(Box<CommandFailureInfo>),
}

impl ExecutionError {
    /// Failure for a command that exited with `status`
    pub fn failure(command: &str, status: Option<i32>, stdout: &str, stderr: &str) -> Self {
        ExecutionError::CommandFailure(Box::new(CommandFailureInfo {
            command: command.to_string(),
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }))
    }
}

/// Text output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into() }
    }

    /// Non-blank output lines, trimmed. Handles CRLF and LF endings.
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whole output trimmed, the way a single-value query is read
    pub fn value(&self) -> &str {
        self.stdout.trim()
    }
}

/// How a failure of a step is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecMode {
    /// Failure aborts the remaining sequence
    FailFast,
    /// Failure is logged and the sequence continues
    BestEffort,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::FailFast => write!(f, "fail-fast"),
            ExecMode::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Runs a command string under the supplied credentials.
///
/// - In production this is a [`PowerShellExecutor`].
/// - Under test a `FakeExecutor` records commands and returns canned output.
///
/// Timeouts and retries are the implementation's business; callers see
/// every command as synchronous and either succeeding or failing.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command, blocking until it completes
    fn run(&self, command: &str, credentials: &Credentials) -> Result<CommandOutput, ExecutionError>;

    /// Execute a read whose command failure is treated as empty output.
    ///
    /// Only a command that ran and exited unsuccessfully counts as empty;
    /// failing to start the command at all is returned as an error.
    fn run_best_effort(&self, command: &str, credentials: &Credentials) -> Result<CommandOutput, ExecutionError> {
        match self.run(command, credentials) {
            Ok(output) => Ok(output),
            Err(ExecutionError::CommandFailure(info)) => {
                tracing::debug!(command = %command, error = %info, "best-effort command failed");
                Ok(CommandOutput::default())
            }
            Err(e) => Err(e),
        }
    }
}

/// Shared executor handle
pub type BoxedExecutor = Arc<dyn CommandExecutor>;

/// Quote a value as a PowerShell single-quoted string literal
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
