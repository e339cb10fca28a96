//! Host process observation and termination.
//!
//! The managed service runs independently of this tool, so nothing here
//! holds a handle to it: every question about the instance is answered by a
//! fresh enumeration of the host process table.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::command::CommandError;

mod probe;
mod table;
mod terminate;

pub use probe::{ProcessProbe, StateProbe};
pub use table::{ProcessTable, PsProcessTable, parse_ps_output};
pub use terminate::{SignalTerminator, TerminationError, Terminator};

/// Operating system process identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Wraps a raw pid.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw pid.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One row of the host process table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessEntry {
    /// Process identifier.
    pub pid: ProcessId,
    /// Full command line, arguments separated by spaces.
    pub command_line: String,
}

impl ProcessEntry {
    /// Builds an entry from a raw pid and command line.
    #[must_use]
    pub fn new(pid: u32, command_line: impl Into<String>) -> Self {
        Self {
            pid: ProcessId::new(pid),
            command_line: command_line.into(),
        }
    }
}

/// Coarse run state reported for the service.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    /// No matching process was found.
    Stopped,
    /// A matching process is running.
    Started,
}

/// Pid and status pair reported in outcomes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct InstanceStatus {
    /// Pid of the running instance, if any.
    pub pid: Option<ProcessId>,
    /// Observed status.
    pub status: ServiceStatus,
}

/// Result of a single probe of the process table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InstanceSnapshot {
    /// Pid of the first matching process.
    pub pid: Option<ProcessId>,
}

impl InstanceSnapshot {
    /// Snapshot of a stopped service.
    #[must_use]
    pub const fn stopped() -> Self {
        Self { pid: None }
    }

    /// Snapshot of a service running as `pid`.
    #[must_use]
    pub const fn running(pid: ProcessId) -> Self {
        Self { pid: Some(pid) }
    }

    /// Returns `true` when a matching process was observed.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.pid.is_some()
    }

    /// Returns the status derived from the presence of a pid.
    #[must_use]
    pub const fn status(&self) -> ServiceStatus {
        if self.is_running() {
            ServiceStatus::Started
        } else {
            ServiceStatus::Stopped
        }
    }

    /// Pairs the pid with its derived status.
    #[must_use]
    pub const fn as_status(&self) -> InstanceStatus {
        InstanceStatus {
            pid: self.pid,
            status: self.status(),
        }
    }
}

/// Errors raised while enumerating host processes.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProbeError {
    /// Raised when the enumeration command cannot run or fails.
    #[error("process enumeration failed: {0}")]
    Command(#[from] CommandError),
    /// Raised when the enumeration output cannot be interpreted at all.
    #[error("unreadable process listing: {0}")]
    Parse(String),
}
