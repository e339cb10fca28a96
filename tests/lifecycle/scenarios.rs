//! BDD scenarios for lifecycle convergence.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Install a pinned release on a Debian host"
)]
fn scenario_install_release(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Leave a running packaged service untouched"
)]
fn scenario_running_untouched(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Rebuild from source over a running service"
)]
fn scenario_rebuild_running(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Terminate a running service"
)]
fn scenario_terminate(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Nothing to terminate on a stopped host"
)]
fn scenario_nothing_to_terminate(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Fall back to a source build when no release is set"
)]
fn scenario_source_fallback(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Record a failed termination and keep polling"
)]
fn scenario_termination_failure(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
