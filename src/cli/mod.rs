//! Command-line interface definitions for the `reposectl` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Parser};

/// Top-level CLI for the `reposectl` binary.
#[derive(Debug, Parser)]
#[command(
    name = "reposectl",
    about = "Bring a Repose instance to the requested state and report the outcome as JSON",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Converge the service to the desired state.
    #[command(
        name = "converge",
        about = "Install, build, start, or stop the service to match the desired state"
    )]
    Converge(ConvergeCommand),
}

/// Arguments for the `reposectl converge` subcommand.
///
/// Every flag overrides the value loaded from `reposectl.toml` and the
/// `REPOSE_*` environment variables.
#[derive(Debug, Parser)]
pub(crate) struct ConvergeCommand {
    /// Desired state: `present` or `absent`.
    #[arg(long, value_name = "STATE")]
    pub(crate) state: Option<String>,
    /// Package version to install.
    ///
    /// Without a release the service is built from source.
    #[arg(long, value_name = "VERSION")]
    pub(crate) release: Option<String>,
    /// Build from source even when a release is configured.
    #[arg(long)]
    pub(crate) git_build: bool,
    /// Repository to build from.
    #[arg(long, value_name = "URL")]
    pub(crate) git_repo: Option<String>,
    /// Branch to build from.
    #[arg(long, value_name = "BRANCH")]
    pub(crate) git_branch: Option<String>,
    /// Wait until the service reaches the desired state.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "no_wait")]
    pub(crate) wait: bool,
    /// Probe once instead of waiting.
    #[arg(long, action = ArgAction::SetTrue)]
    pub(crate) no_wait: bool,
    /// Maximum wait in seconds; `0` waits forever.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) wait_timeout: Option<u64>,
    /// Leave a running service alone instead of rebuilding from source over it.
    #[arg(long)]
    pub(crate) skip_running_rebuild: bool,
}
