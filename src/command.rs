//! Command execution abstraction shared by provisioning and process probing.
//!
//! Every host-side command (package manager, git, maven, service start, `ps`)
//! flows through a [`CommandRunner`] so tests can substitute a scripted
//! runner and assert on the exact invocations.

use std::ffi::OsString;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::debug;

/// Shell used when a command requests shell semantics.
pub const SHELL_BIN: &str = "sh";

/// Description of a single command invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandLine {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Working directory for the child process, if any.
    pub cwd: Option<Utf8PathBuf>,
}

impl CommandLine {
    /// Starts a command for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Wraps `script` in `sh -c` so pipelines and `&&` chains are honoured.
    ///
    /// The caller is responsible for escaping any interpolated values.
    #[must_use]
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new(SHELL_BIN).arg("-c").arg(script.into())
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Utf8Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Renders the invocation as a single shell-like string for logs and
    /// error messages.
    #[must_use]
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

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

/// Errors raised while executing host commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a checked command completes with a non-zero exit code.
    #[error("`{command}` exited with status {status_text}: {stderr}")]
    Failure {
        /// Rendered command line.
        command: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `command`, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError>;

    /// Runs `command` and treats any non-zero exit as a failure.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] when the command cannot be started and
    /// [`CommandError::Failure`] when it exits unsuccessfully.
    fn run_checked(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        let output = self.run(command)?;
        if output.is_success() {
            return Ok(output);
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(CommandError::Failure {
            command: command.display(),
            status: output.code,
            status_text,
            stderr: output.stderr,
        })
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        (**self).run(command)
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        debug!(command = %command.display(), cwd = ?command.cwd, "running command");
        let mut process = Command::new(&command.program);
        process.args(&command.args);
        if let Some(ref dir) = command.cwd {
            process.current_dir(dir);
        }

        let output = process.output().map_err(|err| CommandError::Spawn {
            program: command.program.clone(),
            message: err.to_string(),
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
