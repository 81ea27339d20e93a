//! Core execution types and the command runner abstraction.

use std::ffi::OsString;
use std::fmt;
use std::process::Command;

use serde::Serialize;

use super::RemoteError;

/// Result of running a local process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| RemoteError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Exit status and captured streams of a command run on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Exit code reported by the SSH client, if any.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Returns `true` when the remote command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

impl From<CommandOutput> for RemoteCommandOutput {
    fn from(output: CommandOutput) -> Self {
        Self {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Whether a remote command runs through `sudo`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Privilege {
    /// Run as the connecting user.
    Standard,
    /// Run with administrative rights.
    Elevated,
}

/// A remote command that exited unsuccessfully.
///
/// Callers attach this to their typed errors so the captured stderr reaches
/// the user.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CommandFailure {
    /// Command text as sent to the remote shell.
    pub command: String,
    /// Exit status, if the remote side reported one.
    pub status: Option<i32>,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandFailure {
    /// Captures the failure details of `output` for `command`.
    #[must_use]
    pub fn new(command: impl Into<String>, output: &RemoteCommandOutput) -> Self {
        Self {
            command: command.into(),
            status: output.exit_code,
            stderr: output.stderr.trim().to_owned(),
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_text = self
            .status
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        write!(
            formatter,
            "`{}` exited with status {status_text}",
            self.command
        )?;
        if !self.stderr.is_empty() {
            write!(formatter, ": {}", self.stderr)?;
        }
        Ok(())
    }
}
