//! Forced termination of the running instance.

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use thiserror::Error;
use tracing::info;

use super::ProcessId;

/// Raised when the termination signal cannot be delivered.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to terminate pid {pid}: {message}")]
pub struct TerminationError {
    /// Pid that was targeted.
    pub pid: ProcessId,
    /// Underlying operating system message.
    pub message: String,
}

/// Sends a termination signal to a process.
pub trait Terminator {
    /// Terminates `pid` without waiting for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`TerminationError`] when the signal cannot be sent.
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminationError>;
}

impl<K: Terminator + ?Sized> Terminator for &K {
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminationError> {
        (**self).terminate(pid)
    }
}

/// Delivers `SIGKILL`; the service gets no chance to shut down cleanly.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalTerminator;

impl Terminator for SignalTerminator {
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminationError> {
        let raw = i32::try_from(pid.get()).map_err(|err| TerminationError {
            pid,
            message: err.to_string(),
        })?;
        kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(|errno| TerminationError {
            pid,
            message: errno.desc().to_owned(),
        })?;
        info!(%pid, "sent SIGKILL");
        Ok(())
    }
}
