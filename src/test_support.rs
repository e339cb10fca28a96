//! Test support utilities shared across unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::command::{CommandError, CommandLine, CommandOutput, CommandRunner};
use crate::process::{
    ProbeError, ProcessEntry, ProcessId, ProcessTable, TerminationError, Terminator,
};
use crate::provision::{
    CONFIG_SOURCE_DIR, DeploymentLayout, EXTENSIONS_BUNDLE, FILTER_BUNDLE, VALVE_JAR_SOURCE,
};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandLine>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandLine> {
        self.invocations.borrow().clone()
    }

    /// Returns every recorded invocation rendered as a shell-like string.
    #[must_use]
    pub fn command_strings(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(CommandLine::display)
            .collect()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes `count` successful exit statuses.
    pub fn push_successes(&self, count: usize) {
        for _ in 0..count {
            self.push_success();
        }
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(command.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: command.program.clone(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Process table that replays scripted listings.
///
/// Listings are consumed in FIFO order; the final listing is sticky so a
/// poller can keep observing a settled host.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProcessTable {
    listings: Rc<RefCell<VecDeque<Vec<ProcessEntry>>>>,
    calls: Rc<Cell<usize>>,
}

impl ScriptedProcessTable {
    /// Creates a table with no listings; it reports an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a listing.
    pub fn push_listing(&self, entries: Vec<ProcessEntry>) {
        self.listings.borrow_mut().push_back(entries);
    }

    /// Queues a listing with the service running as `pid`.
    pub fn push_running(&self, pid: u32, signature: &str) {
        self.push_listing(vec![
            ProcessEntry::new(1, "/sbin/init"),
            ProcessEntry::new(pid, format!("java -jar /usr/share/lib/{signature}.jar")),
        ]);
    }

    /// Queues a listing without the service.
    pub fn push_stopped(&self) {
        self.push_listing(vec![ProcessEntry::new(1, "/sbin/init")]);
    }

    /// Returns how many times the table was enumerated.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ProcessTable for ScriptedProcessTable {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProbeError> {
        self.calls.set(self.calls.get() + 1);
        let mut listings = self.listings.borrow_mut();
        if listings.len() > 1 {
            return Ok(listings.pop_front().unwrap_or_default());
        }
        Ok(listings.front().cloned().unwrap_or_default())
    }
}

/// Terminator that records requested pids and optionally fails.
#[derive(Clone, Debug, Default)]
pub struct RecordingTerminator {
    pids: Rc<RefCell<Vec<ProcessId>>>,
    failure: Rc<RefCell<Option<String>>>,
}

impl RecordingTerminator {
    /// Creates a terminator that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.borrow_mut() = Some(message.into());
    }

    /// Returns the pids passed to [`Terminator::terminate`].
    #[must_use]
    pub fn terminated(&self) -> Vec<ProcessId> {
        self.pids.borrow().clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, pid: ProcessId) -> Result<(), TerminationError> {
        self.pids.borrow_mut().push(pid);
        match self.failure.borrow().as_ref() {
            Some(message) => Err(TerminationError {
                pid,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Writes the build outputs a successful `mvn install` would leave in the
/// checkout, so a scripted source build can deploy real files.
///
/// # Errors
///
/// Returns any I/O error raised while creating the files.
pub fn seed_build_outputs(layout: &DeploymentLayout) -> io::Result<()> {
    let checkout = &layout.checkout_dir;
    let jar = checkout.join(VALVE_JAR_SOURCE);
    if let Some(parent) = jar.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&jar, b"valve-jar")?;

    for bundle in [&EXTENSIONS_BUNDLE, &FILTER_BUNDLE] {
        let dir = checkout.join(bundle.source_dir);
        fs::create_dir_all(&dir)?;
        let artifact = format!("{}8.0.0-{}", bundle.prefix, bundle.suffix.trim_start_matches('-'));
        fs::write(dir.join(artifact), bundle.deployed_name.as_bytes())?;
    }

    let configs = checkout.join(CONFIG_SOURCE_DIR);
    fs::create_dir_all(configs.join("examples"))?;
    fs::write(configs.join("system-model.cfg.xml"), b"<system-model/>")?;
    fs::write(configs.join("container.cfg.xml"), b"<repose-container/>")?;
    Ok(())
}

/// Serialises environment mutation across tests in one binary.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Scoped `REPOSE_*` environment for configuration tests.
///
/// Holds [`ENV_LOCK`] for its lifetime and restores every touched variable
/// on drop.
pub struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets `pairs` and removes `cleared`, so stray host values cannot leak
    /// into a test.
    #[must_use]
    pub fn set_and_clear(pairs: &[(&str, &str)], cleared: &[&str]) -> Self {
        let changes: Vec<_> = pairs
            .iter()
            .map(|&(key, value)| (key, Some(value)))
            .chain(cleared.iter().map(|&key| (key, None)))
            .collect();
        Self::apply(&changes)
    }

    fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut keys = BTreeSet::new();
                changes.iter().all(|(key, _)| keys.insert(*key))
            },
            "each variable may appear once per EnvGuard"
        );

        let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let saved = changes
            .iter()
            .map(|&(key, value)| {
                let previous = env::var_os(key);
                write_var(key, value.map(OsString::from).as_ref());
                (key.to_owned(), previous)
            })
            .collect();

        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.saved.iter().rev() {
            write_var(key, previous.as_ref());
        }
    }
}

fn write_var(key: &str, value: Option<&OsString>) {
    // SAFETY: callers hold `ENV_LOCK`, so no other test thread touches the
    // environment concurrently.
    unsafe {
        match value {
            Some(set) => env::set_var(key, set),
            None => env::remove_var(key),
        }
    }
}
