//! BDD step definitions for multi-stack coordination.

use rstest_bdd_macros::{given, then, when};
use stackpilot::{RunReport, StackConfig};

use super::test_helpers::{CoordinatorContext, stack_config};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn report(coordinator_context: &CoordinatorContext) -> Result<RunReport, StepError> {
    coordinator_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("the job has not run")))
}

fn names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[given("a stack \"{name}\" that completes")]
fn stack_completes(coordinator_context: &CoordinatorContext, name: String) {
    coordinator_context.script_success(&name, &[]);
    coordinator_context.add(stack_config(&name));
}

#[given("a stack \"{name}\" that completes with output \"{key}\" as \"{value}\"")]
fn stack_completes_with_output(
    coordinator_context: &CoordinatorContext,
    name: String,
    key: String,
    value: String,
) {
    coordinator_context.script_success(&name, &[(key.as_str(), value.as_str())]);
    coordinator_context.add(stack_config(&name));
}

#[given("a stack named \"{template}\" that completes as \"{name}\"")]
fn templated_stack_completes(
    coordinator_context: &CoordinatorContext,
    template: String,
    name: String,
) {
    coordinator_context.script_success(&name, &[]);
    coordinator_context.add(stack_config(&template));
}

#[given("a stack \"{name}\" that fails")]
fn stack_fails(coordinator_context: &CoordinatorContext, name: String) {
    coordinator_context.script_failure(&name);
    coordinator_context.add(stack_config(&name));
}

#[given("a cascading stack \"{name}\" that fails")]
fn cascading_stack_fails(coordinator_context: &CoordinatorContext, name: String) {
    coordinator_context.script_failure(&name);
    coordinator_context.add(StackConfig {
        fail_cascade: true,
        ..stack_config(&name)
    });
}

#[given("a stack \"{name}\" that never settles within \"{seconds}\" seconds")]
fn stack_never_settles(coordinator_context: &CoordinatorContext, name: String, seconds: i64) {
    coordinator_context.script_stuck(&name);
    coordinator_context.add(StackConfig {
        timeout_secs: seconds,
        ..stack_config(&name)
    });
}

#[given("a retained stack \"{name}\" that completes")]
fn retained_stack_completes(coordinator_context: &CoordinatorContext, name: String) {
    coordinator_context.script_success(&name, &[]);
    coordinator_context.add(StackConfig {
        auto_delete: false,
        ..stack_config(&name)
    });
}

#[when("the job runs")]
fn job_runs(coordinator_context: &CoordinatorContext) {
    coordinator_context.run();
}

#[then("the job succeeds")]
fn job_succeeds(coordinator_context: &CoordinatorContext) -> Result<(), StepError> {
    if report(coordinator_context)?.succeeded {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "expected every stack to be created",
        )))
    }
}

#[then("the job fails")]
fn job_fails(coordinator_context: &CoordinatorContext) -> Result<(), StepError> {
    if report(coordinator_context)?.succeeded {
        Err(StepError::Assertion(String::from(
            "expected the job to fail",
        )))
    } else {
        Ok(())
    }
}

#[then("stacks were provisioned in the order \"{list}\"")]
fn provisioned_in_order(
    coordinator_context: &CoordinatorContext,
    list: String,
) -> Result<(), StepError> {
    let actual = coordinator_context.client.provisioned();
    let expected = names(&list);
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected provisioning order {expected:?}, got {actual:?}"
        )))
    }
}

#[then("stacks were deleted in the order \"{list}\"")]
fn deleted_in_order(
    coordinator_context: &CoordinatorContext,
    list: String,
) -> Result<(), StepError> {
    let actual = coordinator_context.client.deleted();
    let expected = names(&list);
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected deletion order {expected:?}, got {actual:?}"
        )))
    }
}

#[then("stack \"{name}\" is retained")]
fn stack_retained(coordinator_context: &CoordinatorContext, name: String) -> Result<(), StepError> {
    let retained = report(coordinator_context)?.teardown.retained;
    if retained.contains(&name) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {name} to be retained, retained: {retained:?}"
        )))
    }
}

#[then("the build step sees \"{key}\" as \"{value}\"")]
fn build_step_sees(
    coordinator_context: &CoordinatorContext,
    key: String,
    value: String,
) -> Result<(), StepError> {
    let env = coordinator_context
        .step_env()
        .ok_or_else(|| StepError::Assertion(String::from("the build step did not run")))?;
    match env.get(&key) {
        Some(actual) if actual == value => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {key}={value} in the build step, got {other:?}"
        ))),
    }
}

#[then("the build step is skipped")]
fn build_step_skipped(coordinator_context: &CoordinatorContext) -> Result<(), StepError> {
    if coordinator_context.step_env().is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "the build step should not run after a failure",
        )))
    }
}

#[then("the log mentions \"{text}\"")]
fn log_mentions(coordinator_context: &CoordinatorContext, text: String) -> Result<(), StepError> {
    if coordinator_context.sink.contains(&text) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected log line containing {text:?}, got {:?}",
            coordinator_context.sink.lines()
        )))
    }
}
