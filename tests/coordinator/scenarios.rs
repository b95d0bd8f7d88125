use rstest_bdd_macros::scenario;

use super::test_helpers::{CoordinatorContext, coordinator_context};

#[scenario(
    path = "tests/features/coordinator.feature",
    name = "Outputs of earlier stacks reach later stacks and the build step"
)]
fn scenario_outputs_flow(coordinator_context: CoordinatorContext) {
    let _ = coordinator_context;
}

#[scenario(
    path = "tests/features/coordinator.feature",
    name = "A cascading failure skips the remaining stacks"
)]
fn scenario_cascade_skips(coordinator_context: CoordinatorContext) {
    let _ = coordinator_context;
}

#[scenario(
    path = "tests/features/coordinator.feature",
    name = "A failure without cascade lets later stacks run"
)]
fn scenario_failure_continues(coordinator_context: CoordinatorContext) {
    let _ = coordinator_context;
}

#[scenario(
    path = "tests/features/coordinator.feature",
    name = "A timeout halts the run regardless of cascade"
)]
fn scenario_timeout_halts(coordinator_context: CoordinatorContext) {
    let _ = coordinator_context;
}

#[scenario(
    path = "tests/features/coordinator.feature",
    name = "Stacks without auto-delete survive teardown"
)]
fn scenario_retained_stack(coordinator_context: CoordinatorContext) {
    let _ = coordinator_context;
}
