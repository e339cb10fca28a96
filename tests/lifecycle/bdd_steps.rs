//! BDD step definitions for lifecycle convergence.

use reposectl::test_support::seed_build_outputs;
use reposectl::{DesiredState, Outcome, ProcessId, WaitPolicy};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{LifecycleContext, SIGNATURE};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn outcome(lifecycle_context: &LifecycleContext) -> Result<Outcome, StepError> {
    lifecycle_context
        .outcome
        .borrow()
        .clone()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

#[given("a Debian host where the service is stopped")]
fn host_stopped(lifecycle_context: &LifecycleContext) {
    lifecycle_context.table.push_stopped();
}

#[given("a Debian host where the service runs as pid \"{pid}\"")]
fn host_running(lifecycle_context: &LifecycleContext, pid: u32) {
    lifecycle_context.table.push_running(pid, SIGNATURE);
}

#[given("the release \"{release}\" is requested")]
fn release_requested(lifecycle_context: &LifecycleContext, release: String) {
    lifecycle_context.settings.borrow_mut().provisioning.release = Some(release);
}

#[given("the package installs and starts the service as pid \"{pid}\"")]
fn package_installs(lifecycle_context: &LifecycleContext, pid: u32) {
    lifecycle_context.runner.push_successes(2);
    lifecycle_context.table.push_running(pid, SIGNATURE);
}

#[given("the source build succeeds")]
fn source_build_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let layout = lifecycle_context.settings.borrow().layout.clone();
    seed_build_outputs(&layout).map_err(|err| StepError::Assertion(err.to_string()))?;
    lifecycle_context.runner.push_successes(4);
    Ok(())
}

#[given("the service stops once terminated")]
fn service_stops(lifecycle_context: &LifecycleContext) {
    lifecycle_context.table.push_stopped();
}

#[given("waiting is enabled with a timeout of \"{seconds}\" seconds")]
fn waiting_enabled(lifecycle_context: &LifecycleContext, seconds: u64) {
    lifecycle_context.settings.borrow_mut().wait = WaitPolicy::waiting(seconds);
}

#[given("the build toolchain is unavailable")]
fn toolchain_unavailable(lifecycle_context: &LifecycleContext) {
    lifecycle_context.runner.push_failure(127);
}

#[given("termination fails with \"{message}\"")]
fn termination_fails(lifecycle_context: &LifecycleContext, message: String) {
    lifecycle_context.terminator.fail_with(message);
}

#[when("I converge to \"{state}\"")]
fn converge(lifecycle_context: &LifecycleContext, state: String) -> Result<(), StepError> {
    let desired =
        DesiredState::parse(&state).map_err(|err| StepError::Assertion(err.to_string()))?;
    lifecycle_context.settings.borrow_mut().desired = desired;
    lifecycle_context.converge();
    Ok(())
}

#[then("the outcome is successful")]
fn outcome_successful(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    ensure(!outcome.is_failure() && outcome.success.is_some(), || {
        format!("expected success, got {outcome:?}")
    })
}

#[then("the outcome reports a change")]
fn outcome_changed(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    ensure(outcome.changed, || format!("expected a change, got {outcome:?}"))
}

#[then("the outcome reports no change")]
fn outcome_unchanged(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    ensure(!outcome.changed, || format!("expected no change, got {outcome:?}"))
}

#[then("the final pid is \"{pid}\"")]
fn final_pid(lifecycle_context: &LifecycleContext, pid: u32) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    ensure(outcome.final_pid == Some(ProcessId::new(pid)), || {
        format!("expected final pid {pid}, got {:?}", outcome.final_pid)
    })
}

#[then("the untouched pid is \"{pid}\"")]
fn untouched_pid(lifecycle_context: &LifecycleContext, pid: u32) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    let observed = outcome.untouched.and_then(|status| status.pid);
    ensure(observed == Some(ProcessId::new(pid)), || {
        format!("expected untouched pid {pid}, got {observed:?}")
    })
}

#[then("the install command pins \"{package_spec}\"")]
fn install_pins(lifecycle_context: &LifecycleContext, package_spec: String) -> Result<(), StepError> {
    let commands = lifecycle_context.runner.command_strings();
    ensure(
        commands
            .first()
            .is_some_and(|command| command.contains(package_spec.as_str())),
        || format!("expected install of {package_spec}, got {commands:?}"),
    )
}

#[then("no host command was run")]
fn no_commands(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let commands = lifecycle_context.runner.command_strings();
    ensure(commands.is_empty(), || {
        format!("expected no commands, got {commands:?}")
    })
}

#[then("the first host command is \"{expected}\"")]
fn first_command(lifecycle_context: &LifecycleContext, expected: String) -> Result<(), StepError> {
    let commands = lifecycle_context.runner.command_strings();
    ensure(commands.first() == Some(&expected), || {
        format!("expected first command {expected:?}, got {commands:?}")
    })
}

#[then("pid \"{pid}\" was terminated")]
fn pid_terminated(lifecycle_context: &LifecycleContext, pid: u32) -> Result<(), StepError> {
    let terminated = lifecycle_context.terminator.terminated();
    ensure(terminated == vec![ProcessId::new(pid)], || {
        format!("expected pid {pid} to be terminated, got {terminated:?}")
    })
}

#[then("no process was terminated")]
fn nothing_terminated(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let terminated = lifecycle_context.terminator.terminated();
    ensure(terminated.is_empty(), || {
        format!("expected no termination, got {terminated:?}")
    })
}

#[then("the termination error is \"{message}\"")]
fn termination_error(lifecycle_context: &LifecycleContext, message: String) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    ensure(
        outcome.termination_error.as_deref() == Some(message.as_str()),
        || format!("expected termination error {message:?}, got {outcome:?}"),
    )
}

#[then("the outcome is a failure mentioning \"{text}\"")]
fn outcome_failure(lifecycle_context: &LifecycleContext, text: String) -> Result<(), StepError> {
    let outcome = outcome(lifecycle_context)?;
    let mentions = outcome
        .message
        .as_deref()
        .is_some_and(|message| message.contains(text.as_str()));
    ensure(outcome.is_failure() && mentions, || {
        format!("expected failure mentioning {text:?}, got {outcome:?}")
    })
}
