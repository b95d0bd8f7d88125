//! Process execution abstraction.
//!
//! The provider client and the `run` subcommand both shell out; routing that
//! through [`CommandRunner`] lets tests script outputs without spawning
//! processes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Result of running an external command.
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

/// Errors raised when a command cannot be run.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when the process fails to start.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error message.
        message: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, adding `envs` to the inherited
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        envs: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, CommandError>;
}

fn spawn_error(program: &str, err: &std::io::Error) -> CommandError {
    CommandError::Spawn {
        program: program.to_owned(),
        message: err.to_string(),
    }
}

/// Runner that captures stdout and stderr.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        envs: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, CommandError> {
        let output = Command::new(program)
            .args(args)
            .envs(envs)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| spawn_error(program, &err))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runner that lets the child inherit the terminal, for user commands whose
/// output should stream live. Captured output is always empty.
#[derive(Clone, Debug, Default)]
pub struct StreamingCommandRunner;

impl CommandRunner for StreamingCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        envs: &BTreeMap<String, String>,
    ) -> Result<CommandOutput, CommandError> {
        let status = Command::new(program)
            .args(args)
            .envs(envs)
            .status()
            .map_err(|err| spawn_error(program, &err))?;

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
