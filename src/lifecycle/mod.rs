//! Idempotent lifecycle control for a single service instance.
//!
//! One invocation observes the host, acts only when the observed state
//! differs from the desired one, waits for convergence, and reports an
//! [`Outcome`] assembled from a final fresh probe.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::platform::HostPlatform;
use crate::poll::{ConvergencePoller, POLL_INTERVAL, WaitPolicy};
use crate::process::{InstanceStatus, ProcessId, ProcessProbe, ProcessTable, Terminator};
use crate::provision::{
    DEFAULT_PACKAGE_NAME, DeploymentLayout, Provision, ProvisionHost, ProvisionStrategy,
    ProvisioningConfig, StrategyKind,
};

mod error;
mod outcome;

pub use error::{LifecycleError, UnknownStateError};
pub use outcome::{Action, ActionRecord, FailureReport, FailureStatus, Outcome};

/// State the service should be in after the invocation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DesiredState {
    /// Running.
    #[default]
    Present,
    /// Not running.
    Absent,
}

impl DesiredState {
    /// Parses `present` or `absent`, ignoring case and surrounding
    /// whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownStateError`] for any other value.
    pub fn parse(value: &str) -> Result<Self, UnknownStateError> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("present") {
            Ok(Self::Present)
        } else if trimmed.eq_ignore_ascii_case("absent") {
            Ok(Self::Absent)
        } else {
            Err(UnknownStateError(value.to_owned()))
        }
    }

    /// Action reported for this state.
    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::Present => Action::Start,
            Self::Absent => Action::Delete,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl FromStr for DesiredState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable inputs of one invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LifecycleSettings {
    /// Requested state.
    pub desired: DesiredState,
    /// How to provision when the service must be brought up.
    pub provisioning: ProvisioningConfig,
    /// Whether and how long to wait for convergence.
    pub wait: WaitPolicy,
    /// Command-line fragment identifying the service process.
    pub signature: String,
    /// Deployment locations for source builds.
    pub layout: DeploymentLayout,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            desired: DesiredState::Present,
            provisioning: ProvisioningConfig::default(),
            wait: WaitPolicy::default(),
            signature: DEFAULT_PACKAGE_NAME.to_owned(),
            layout: DeploymentLayout::default(),
        }
    }
}

/// Drives one desired-state transition through the injected collaborators.
#[derive(Debug)]
pub struct LifecycleController<R, T: ProcessTable, K, H> {
    settings: LifecycleSettings,
    runner: R,
    probe: ProcessProbe<T>,
    terminator: K,
    platform: H,
    poll_interval: Duration,
}

impl<R, T, K, H> LifecycleController<R, T, K, H>
where
    R: CommandRunner,
    T: ProcessTable,
    K: Terminator,
    H: HostPlatform,
{
    /// Creates a controller. The probe filters `table` by the configured
    /// signature.
    #[must_use]
    pub fn new(settings: LifecycleSettings, runner: R, table: T, terminator: K, platform: H) -> Self {
        let probe = ProcessProbe::new(table, settings.signature.clone());
        Self {
            settings,
            runner,
            probe,
            terminator,
            platform,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Overrides the pid excluded from probe matches as this process; the
    /// parent process is no longer excluded.
    #[must_use]
    pub fn with_own_pid(mut self, pid: ProcessId) -> Self {
        self.probe = self.probe.with_own_pid(pid);
        self
    }

    /// Overrides the convergence poll interval.
    ///
    /// This is primarily used by tests to keep waits fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Settings this controller was built with.
    #[must_use]
    pub const fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Runs the invocation and folds fatal errors into a failure outcome.
    ///
    /// An aborted invocation still takes a final probe so the outcome
    /// reports the pid left on the host.
    #[must_use]
    pub fn run(&self) -> Outcome {
        self.execute()
            .unwrap_or_else(|aborted| self.aborted_outcome(&aborted))
    }

    /// Runs the invocation.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when provisioning fails or the process
    /// table cannot be read.
    pub fn try_run(&self) -> Result<Outcome, LifecycleError> {
        self.execute().map_err(|aborted| aborted.error)
    }

    fn execute(&self) -> Result<Outcome, Aborted> {
        match self.settings.desired {
            DesiredState::Present => self.ensure_present(),
            DesiredState::Absent => self.ensure_absent().map_err(Aborted::from),
        }
    }

    fn aborted_outcome(&self, aborted: &Aborted) -> Outcome {
        let action = self.settings.desired.action();
        warn!(
            error = %aborted.error,
            state = %self.settings.desired,
            "lifecycle invocation aborted"
        );
        let final_probe = self
            .probe
            .snapshot()
            .inspect_err(|err| debug!(error = %err, "final probe after abort failed"))
            .ok();
        Outcome::from_fatal(action, &aborted.error, final_probe, aborted.untouched)
    }

    fn ensure_present(&self) -> Result<Outcome, Aborted> {
        let before = self.probe.snapshot().map_err(LifecycleError::from)?;
        let untouched = before.is_running().then(|| before.as_status());
        let abort = |error: LifecycleError| Aborted { error, untouched };
        let strategy = ProvisionStrategy::select(&self.settings.provisioning);

        let provisioned = if self.should_provision(before.pid, &strategy) {
            self.note_fallback(&strategy);
            let host = ProvisionHost {
                runner: &self.runner,
                platform: &self.platform,
                layout: &self.settings.layout,
            };
            let report = strategy
                .provision(&host)
                .map_err(|err| abort(err.into()))?;
            info!(
                strategy = report.strategy.as_str(),
                steps = report.steps.len(),
                "provisioning finished"
            );
            true
        } else {
            false
        };

        let convergence = self
            .poller()
            .await_state(true, &self.settings.wait)
            .map_err(|err| abort(err.into()))?;
        let final_probe = self.probe.snapshot().map_err(|err| abort(err.into()))?;
        Ok(Outcome::assess(
            Action::Start,
            final_probe,
            ActionRecord {
                changed: provisioned && convergence.converged,
                convergence,
                untouched,
                termination_error: None,
            },
        ))
    }

    fn should_provision(&self, running: Option<ProcessId>, strategy: &ProvisionStrategy) -> bool {
        let Some(pid) = running else {
            return true;
        };
        let rebuild = strategy.kind() == StrategyKind::SourceBuild
            && !self.settings.provisioning.skip_running_rebuild;
        if rebuild {
            info!(%pid, "service running; rebuilding from source over it");
        } else {
            info!(%pid, "service already running; leaving it untouched");
        }
        rebuild
    }

    fn note_fallback(&self, strategy: &ProvisionStrategy) {
        let config = &self.settings.provisioning;
        if strategy.kind() == StrategyKind::SourceBuild && !config.use_source_build {
            warn!("no release configured; falling back to a source build");
        }
    }

    fn ensure_absent(&self) -> Result<Outcome, LifecycleError> {
        let mut record = ActionRecord::default();
        match self.probe.current_pid()? {
            None => info!("service not running; nothing to terminate"),
            Some(pid) => match self.terminator.terminate(pid) {
                Ok(()) => record.changed = true,
                Err(err) => {
                    warn!(error = %err, "termination failed; still polling for shutdown");
                    record.termination_error = Some(err.message);
                }
            },
        }

        record.convergence = self.poller().await_state(false, &self.settings.wait)?;
        let final_probe = self.probe.snapshot()?;
        Ok(Outcome::assess(Action::Delete, final_probe, record))
    }

    fn poller(&self) -> ConvergencePoller<&ProcessProbe<T>> {
        ConvergencePoller::new(&self.probe).with_poll_interval(self.poll_interval)
    }
}

/// A fatal error together with the pre-action snapshot taken before it.
#[derive(Debug)]
struct Aborted {
    error: LifecycleError,
    untouched: Option<InstanceStatus>,
}

impl From<LifecycleError> for Aborted {
    fn from(error: LifecycleError) -> Self {
        Self {
            error,
            untouched: None,
        }
    }
}
