//! Core library for reposectl, a lifecycle controller for a single Repose
//! instance.
//!
//! One invocation observes the host process table, provisions the service
//! (package install or source build) or terminates it when the observed
//! state differs from the desired one, waits for convergence, and reports a
//! structured [`Outcome`]. Every host-side effect goes through an injected
//! collaborator trait so the controller can be driven by scripted doubles.

pub mod command;
pub mod config;
pub mod lifecycle;
pub mod platform;
pub mod poll;
pub mod process;
pub mod provision;
pub mod test_support;

pub use command::{CommandError, CommandLine, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, LifecycleConfig};
pub use lifecycle::{
    Action, DesiredState, LifecycleController, LifecycleError, LifecycleSettings, Outcome,
};
pub use platform::{HostPlatform, OsRelease, OsReleaseFile, PackageFamily, PlatformError};
pub use poll::{Convergence, ConvergencePoller, DEFAULT_WAIT_TIMEOUT_SECS, WaitPolicy};
pub use process::{
    ProbeError, ProcessId, ProcessProbe, ProcessTable, PsProcessTable, SignalTerminator,
    TerminationError, Terminator,
};
pub use provision::{
    DeploymentLayout, PackageInstall, ProvisionError, ProvisionStrategy, ProvisioningConfig,
    SourceBuild,
};
