//! Signature-based detection of the managed service.

use camino::Utf8Path;
use nix::unistd::getppid;
use tracing::debug;

use super::{InstanceSnapshot, ProbeError, ProcessEntry, ProcessId, ProcessTable};

/// Tools whose own command line names the signature while searching for it.
const FILTER_TOOLS: [&str; 4] = ["grep", "egrep", "fgrep", "pgrep"];

/// Minimal view of the service state used by the convergence poller.
pub trait StateProbe {
    /// Returns `true` when the service is observed running.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the host cannot be inspected.
    fn is_running(&self) -> Result<bool, ProbeError>;
}

impl<P: StateProbe + ?Sized> StateProbe for &P {
    fn is_running(&self) -> Result<bool, ProbeError> {
        (**self).is_running()
    }
}

/// Finds the service in the host process table by command-line signature.
#[derive(Clone, Debug)]
pub struct ProcessProbe<T: ProcessTable> {
    table: T,
    signature: String,
    own_pid: ProcessId,
    parent_pid: Option<ProcessId>,
}

impl<T: ProcessTable> ProcessProbe<T> {
    /// Creates a probe matching command lines that contain `signature`.
    #[must_use]
    pub fn new(table: T, signature: impl Into<String>) -> Self {
        Self {
            table,
            signature: signature.into(),
            own_pid: ProcessId::new(std::process::id()),
            parent_pid: u32::try_from(getppid().as_raw()).ok().map(ProcessId::new),
        }
    }

    /// Overrides the pid treated as this process when excluding
    /// self-matches. The parent exclusion is cleared; set it again with
    /// [`Self::with_parent_pid`].
    #[must_use]
    pub const fn with_own_pid(mut self, pid: ProcessId) -> Self {
        self.own_pid = pid;
        self.parent_pid = None;
        self
    }

    /// Overrides the pid treated as the wrapper that launched this process,
    /// such as `sh -c "reposectl converge ..."`.
    #[must_use]
    pub const fn with_parent_pid(mut self, pid: ProcessId) -> Self {
        self.parent_pid = Some(pid);
        self
    }

    /// Returns the signature this probe searches for.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Takes one fresh look at the process table.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when enumeration fails.
    pub fn snapshot(&self) -> Result<InstanceSnapshot, ProbeError> {
        let entries = self.table.list_processes()?;
        let pid = entries
            .iter()
            .find(|entry| self.matches(entry))
            .map(|entry| entry.pid);
        debug!(signature = %self.signature, pid = ?pid, "probed process table");
        Ok(InstanceSnapshot { pid })
    }

    /// Returns the pid of the first matching process.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when enumeration fails.
    pub fn current_pid(&self) -> Result<Option<ProcessId>, ProbeError> {
        Ok(self.snapshot()?.pid)
    }

    fn matches(&self, entry: &ProcessEntry) -> bool {
        entry.command_line.contains(self.signature.as_str()) && !self.is_self_match(entry)
    }

    fn is_self_match(&self, entry: &ProcessEntry) -> bool {
        if entry.pid == self.own_pid || Some(entry.pid) == self.parent_pid {
            return true;
        }
        entry
            .command_line
            .split_whitespace()
            .next()
            .and_then(|program| Utf8Path::new(program).file_name())
            .is_some_and(|name| FILTER_TOOLS.contains(&name))
    }
}

impl<T: ProcessTable> StateProbe for ProcessProbe<T> {
    fn is_running(&self) -> Result<bool, ProbeError> {
        Ok(self.snapshot()?.is_running())
    }
}
