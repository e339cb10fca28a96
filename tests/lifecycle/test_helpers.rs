//! Shared fixtures for lifecycle BDD scenarios.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use camino::Utf8PathBuf;
use reposectl::test_support::{RecordingTerminator, ScriptedProcessTable, ScriptedRunner};
use reposectl::{
    DeploymentLayout, LifecycleController, LifecycleSettings, Outcome, PackageFamily, ProcessId,
};
use rstest::fixture;
use tempfile::TempDir;

pub const SIGNATURE: &str = "repose-valve";
const TICK: Duration = Duration::from_millis(5);

/// Scripted host plus the settings and outcome of one scenario.
#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub runner: ScriptedRunner,
    pub table: ScriptedProcessTable,
    pub terminator: RecordingTerminator,
    pub settings: Rc<RefCell<LifecycleSettings>>,
    pub outcome: Rc<RefCell<Option<Outcome>>>,
    _root: Rc<TempDir>,
}

impl LifecycleContext {
    /// Runs the controller against the scripted host and stores the outcome.
    pub fn converge(&self) {
        let controller = LifecycleController::new(
            self.settings.borrow().clone(),
            self.runner.clone(),
            self.table.clone(),
            self.terminator.clone(),
            PackageFamily::Debian,
        )
        .with_own_pid(ProcessId::new(1))
        .with_poll_interval(TICK);
        *self.outcome.borrow_mut() = Some(controller.run());
    }
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    let root = TempDir::new().unwrap_or_else(|err| panic!("create scenario root: {err}"));
    let root_path = Utf8PathBuf::from_path_buf(root.path().to_path_buf())
        .unwrap_or_else(|path| panic!("scenario root should be utf8: {}", path.display()));
    let settings = LifecycleSettings {
        layout: DeploymentLayout::rooted_at(&root_path),
        ..LifecycleSettings::default()
    };

    LifecycleContext {
        runner: ScriptedRunner::new(),
        table: ScriptedProcessTable::new(),
        terminator: RecordingTerminator::new(),
        settings: Rc::new(RefCell::new(settings)),
        outcome: Rc::new(RefCell::new(None)),
        _root: Rc::new(root),
    }
}
