//! Binary entry point for the reposectl CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use reposectl::{
    ConfigError, LifecycleConfig, LifecycleController, OsReleaseFile, Outcome,
    ProcessCommandRunner, PsProcessTable, SignalTerminator,
};

mod cli;

use cli::{Cli, ConvergeCommand};

const DEFAULT_LOG_FILTER: &str = "reposectl=info";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to write outcome: {0}")]
    Output(#[from] io::Error),
    #[error("failed to serialise outcome: {0}")]
    Serialise(#[from] serde_json::Error),
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Converge(command) => converge(&command),
    }
}

fn converge(args: &ConvergeCommand) -> Result<i32, CliError> {
    let mut config = LifecycleConfig::load_without_cli_args()?;
    apply_overrides(&mut config, args);
    let settings = config.as_settings()?;

    let runner = ProcessCommandRunner;
    let controller = LifecycleController::new(
        settings,
        runner,
        PsProcessTable::new(runner),
        SignalTerminator,
        OsReleaseFile::default(),
    );
    let outcome = controller.run();
    write_outcome(io::stdout(), &outcome)?;
    Ok(exit_code(&outcome))
}

fn apply_overrides(config: &mut LifecycleConfig, args: &ConvergeCommand) {
    if let Some(ref state) = args.state {
        config.state.clone_from(state);
    }
    if let Some(ref release) = args.release {
        config.release = Some(release.clone());
    }
    if let Some(ref repo) = args.git_repo {
        config.git_repo.clone_from(repo);
    }
    if let Some(ref branch) = args.git_branch {
        config.git_branch.clone_from(branch);
    }
    if let Some(timeout) = args.wait_timeout {
        config.wait_timeout = timeout;
    }
    if let Some(wait) = wait_override(args) {
        config.wait = wait;
    }
    config.git_build |= args.git_build;
    config.skip_running_rebuild |= args.skip_running_rebuild;
}

const fn wait_override(args: &ConvergeCommand) -> Option<bool> {
    if args.wait {
        Some(true)
    } else if args.no_wait {
        Some(false)
    } else {
        None
    }
}

fn write_outcome(mut target: impl Write, outcome: &Outcome) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(outcome)?;
    writeln!(target, "{rendered}")?;
    Ok(())
}

const fn exit_code(outcome: &Outcome) -> i32 {
    if outcome.is_failure() { 1 } else { 0 }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
