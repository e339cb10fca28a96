//! The structured report returned by every invocation.

use std::fmt::Display;

use serde::Serialize;

use crate::poll::Convergence;
use crate::process::{InstanceSnapshot, InstanceStatus, ProcessId};

/// Lifecycle action reported in the outcome.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Bring the service up.
    Start,
    /// Take the service down.
    Delete,
}

impl Action {
    /// Run state that counts as success for this action.
    #[must_use]
    pub const fn target_running(self) -> bool {
        matches!(self, Self::Start)
    }

    /// Message attached when the final probe contradicts the action.
    #[must_use]
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::Start => "Failed to build repose",
            Self::Delete => "Failed to delete repose",
        }
    }
}

/// Status label carried by the `error` field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureStatus {
    /// The service did not reach the desired state.
    Failed,
}

/// Body of the `error` field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct FailureReport {
    /// Always [`FailureStatus::Failed`].
    pub status: FailureStatus,
}

impl FailureReport {
    const FAILED: Self = Self {
        status: FailureStatus::Failed,
    };
}

/// What the controller did before the final probe.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ActionRecord {
    /// A provisioning or termination step took effect.
    pub changed: bool,
    /// Result of waiting for the target state.
    pub convergence: Convergence,
    /// Pre-existing instance left in place.
    pub untouched: Option<InstanceStatus>,
    /// Message from a failed termination attempt.
    pub termination_error: Option<String>,
}

/// Result record of one invocation. Built once and never mutated.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Whether the invocation changed the host.
    pub changed: bool,
    /// Action that was requested.
    pub action: Action,
    /// Pid observed by the final probe.
    pub final_pid: Option<ProcessId>,
    /// Final state when it matches the request.
    pub success: Option<InstanceStatus>,
    /// Set when the final state contradicts the request.
    pub error: Option<FailureReport>,
    /// The convergence wait hit its deadline. Informational only.
    pub timed_out: bool,
    /// Pre-existing instance left in place.
    pub untouched: Option<InstanceStatus>,
    /// Message from a failed termination attempt.
    pub termination_error: Option<String>,
    /// Failure description; present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    /// Builds the outcome from the final probe. The final state alone
    /// decides between `success` and `error`.
    #[must_use]
    pub fn assess(action: Action, final_probe: InstanceSnapshot, record: ActionRecord) -> Self {
        let converged = final_probe.is_running() == action.target_running();
        Self {
            changed: record.changed,
            action,
            final_pid: final_probe.pid,
            success: converged.then(|| final_probe.as_status()),
            error: (!converged).then_some(FailureReport::FAILED),
            timed_out: record.convergence.timed_out,
            untouched: record.untouched,
            termination_error: record.termination_error,
            message: (!converged).then(|| action.failure_message().to_owned()),
        }
    }

    /// Builds a failure outcome for an invocation aborted by `err`.
    ///
    /// `final_probe` is the snapshot taken after the abort, or `None` when
    /// the host could not be probed; `untouched` is the pre-action snapshot.
    #[must_use]
    pub fn from_fatal(
        action: Action,
        err: &impl Display,
        final_probe: Option<InstanceSnapshot>,
        untouched: Option<InstanceStatus>,
    ) -> Self {
        Self {
            changed: false,
            action,
            final_pid: final_probe.and_then(|snapshot| snapshot.pid),
            success: None,
            error: Some(FailureReport::FAILED),
            timed_out: false,
            untouched,
            termination_error: None,
            message: Some(err.to_string()),
        }
    }

    /// Returns `true` when the outcome must be reported as a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
