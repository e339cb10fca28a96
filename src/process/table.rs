//! Process enumeration backed by `ps`.

use tracing::debug;

use crate::command::{CommandLine, CommandRunner};

use super::{ProbeError, ProcessEntry, ProcessId};

const PS_BIN: &str = "ps";

/// Source of host process listings.
pub trait ProcessTable {
    /// Lists every process visible on the host.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the listing cannot be obtained.
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProbeError>;
}

impl<T: ProcessTable + ?Sized> ProcessTable for &T {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProbeError> {
        (**self).list_processes()
    }
}

/// Lists processes with `ps -eo pid=,args=`.
#[derive(Clone, Debug)]
pub struct PsProcessTable<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> PsProcessTable<R> {
    /// Creates a table that invokes `ps` through `runner`.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    fn command() -> CommandLine {
        CommandLine::new(PS_BIN).args(["-eo", "pid=,args="])
    }
}

impl<R: CommandRunner> ProcessTable for PsProcessTable<R> {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProbeError> {
        let output = self.runner.run_checked(&Self::command())?;
        let entries = parse_ps_output(&output.stdout);
        if entries.is_empty() && !output.stdout.trim().is_empty() {
            return Err(ProbeError::Parse(String::from(
                "no process rows could be parsed",
            )));
        }
        Ok(entries)
    }
}

/// Parses `pid args...` rows, skipping blank or malformed lines.
#[must_use]
pub fn parse_ps_output(stdout: &str) -> Vec<ProcessEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                return None;
            }
            let (pid_text, rest) = trimmed
                .split_once(char::is_whitespace)
                .unwrap_or((trimmed, ""));
            match pid_text.parse::<u32>() {
                Ok(pid) => Some(ProcessEntry {
                    pid: ProcessId::new(pid),
                    command_line: rest.trim().to_owned(),
                }),
                Err(err) => {
                    debug!(line, error = %err, "skipping unparsable ps row");
                    None
                }
            }
        })
        .collect()
}
