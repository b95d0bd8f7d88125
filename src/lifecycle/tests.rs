//! Tests for the single-stack lifecycle.

use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::client::ClientError;
use crate::env::Environment;
use crate::log::SharedSink;
use crate::stack::{StackHandle, StackSpec, StackStatus, TemplateSource};
use crate::test_support::{
    ClientCall, MemorySink, ScriptedClient, cancel_on_first_yield, description, event, output,
    summary,
};

const NAME: &str = "app-stack";

struct Harness {
    client: ScriptedClient,
    sink: MemorySink,
}

impl Harness {
    fn lifecycle(&self) -> StackLifecycle<ScriptedClient> {
        let sink: SharedSink = Arc::new(self.sink.clone());
        StackLifecycle::new(self.client.clone(), sink)
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        client: ScriptedClient::new(),
        sink: MemorySink::new(),
    }
}

fn spec_with(poll: PollPolicy) -> StackSpec {
    StackSpec::builder()
        .name(NAME)
        .template(TemplateSource::Body(String::from("{}")))
        .poll(poll)
        .build()
        .expect("spec should build")
}

fn spec() -> StackSpec {
    spec_with(PollPolicy::disabled())
}

fn throttled() -> ClientError {
    ClientError::Throttled {
        operation: String::from("CreateStack"),
        message: String::from("Rate exceeded"),
    }
}

async fn created(harness: &Harness) -> StackHandle {
    harness
        .lifecycle()
        .create(&spec(), &Environment::new())
        .await
        .expect("create should succeed")
}

#[rstest]
#[tokio::test]
async fn existing_stack_is_updated_after_three_describes(harness: Harness) {
    harness
        .client
        .push_status(NAME, StackStatus::CreateInProgress);
    harness
        .client
        .push_status(NAME, StackStatus::CreateInProgress);
    let mut done = description(NAME, StackStatus::CreateComplete);
    done.outputs = vec![output("Endpoint", "https://app.example")];
    harness.client.push_describe(NAME, Ok(vec![done]));

    let handle = created(&harness).await;

    assert_eq!(harness.client.describe_count(NAME), 3);
    assert_eq!(
        handle.outputs.get("app-stack_Endpoint"),
        Some("https://app.example")
    );
    assert!(harness.client.calls().contains(&ClientCall::Update(NAME.to_owned())));
    assert!(harness.sink.contains("Successfully created stack: app-stack"));
}

#[rstest]
#[tokio::test]
async fn missing_stack_is_created_after_four_describes(harness: Harness) {
    harness.client.script_create(
        NAME,
        &[
            StackStatus::CreateInProgress,
            StackStatus::CreateInProgress,
            StackStatus::CreateComplete,
        ],
        &[("Endpoint", "https://app.example")],
    );

    let handle = created(&harness).await;

    assert_eq!(harness.client.describe_count(NAME), 4);
    assert!(harness.client.calls().contains(&ClientCall::Create(NAME.to_owned())));
    assert!(!harness.client.calls().contains(&ClientCall::Update(NAME.to_owned())));
    assert_eq!(
        handle.outputs.get("app-stack_Endpoint"),
        Some("https://app.example")
    );
    assert_eq!(handle.status, StackStatus::CreateComplete);
}

#[rstest]
#[tokio::test]
async fn missing_stack_is_created(harness: Harness) {
    harness.client.script_create(
        NAME,
        &[StackStatus::CreateInProgress, StackStatus::CreateComplete],
        &[("BucketName", "bucket-1")],
    );

    let handle = created(&harness).await;

    assert_eq!(harness.client.provisioned(), vec![NAME.to_owned()]);
    assert!(harness.client.calls().contains(&ClientCall::Create(NAME.to_owned())));
    assert_eq!(handle.status, StackStatus::CreateComplete);
    assert_eq!(handle.outputs.get("app-stack_BucketName"), Some("bucket-1"));
    assert!(harness.sink.contains("Creating stack: app-stack"));
}

#[rstest]
#[tokio::test]
async fn stack_name_is_expanded_from_environment(harness: Harness) {
    harness
        .client
        .script_create("app-42", &[StackStatus::CreateComplete], &[]);
    let spec = StackSpec {
        name: String::from("app-${BUILD}"),
        ..spec()
    };
    let env: Environment = [("BUILD", "42")].into_iter().collect();

    let handle = harness
        .lifecycle()
        .create(&spec, &env)
        .await
        .expect("create should succeed");

    assert_eq!(handle.name, "app-42");
}

#[rstest]
#[tokio::test]
async fn failed_create_reports_reason(harness: Harness) {
    harness.client.push_missing(NAME);
    let mut failed = description(NAME, StackStatus::CreateFailed);
    failed.status_reason = Some(String::from("Bucket already exists"));
    harness.client.push_describe(NAME, Ok(vec![failed]));

    let err = harness
        .lifecycle()
        .create(&spec(), &Environment::new())
        .await
        .expect_err("create should fail");

    assert_eq!(
        err,
        StackError::TerminalFailure {
            name: NAME.to_owned(),
            status: StackStatus::CreateFailed,
            reason: String::from("Bucket already exists"),
        }
    );
    assert!(!err.halts_run());
    assert!(harness
        .sink
        .contains("Failed to create stack: app-stack. Reason: Bucket already exists"));
}

#[rstest]
#[tokio::test]
async fn rolled_back_create_is_a_failure(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::RollbackComplete], &[]);

    let err = harness
        .lifecycle()
        .create(&spec(), &Environment::new())
        .await
        .expect_err("rollback should fail the create");

    assert!(matches!(
        err,
        StackError::TerminalFailure {
            status: StackStatus::RollbackComplete,
            ..
        }
    ));
}

#[rstest]
#[tokio::test]
async fn events_are_logged_oldest_first(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    harness.client.set_events(
        NAME,
        Ok(vec![
            event("evt-3", "CREATE_COMPLETE", None),
            event("evt-2", "CREATE_IN_PROGRESS", Some("Resource creation Initiated")),
            event("evt-1", "CREATE_IN_PROGRESS", Some("User Initiated")),
        ]),
    );

    created(&harness).await;

    let first = harness.sink.position("evt-1").expect("evt-1 logged");
    let last = harness.sink.position("evt-3").expect("evt-3 logged");
    assert!(first < last);
    assert!(harness.sink.contains(
        "evt-2 - AWS::CloudFormation::Stack - CREATE_IN_PROGRESS - Resource creation Initiated"
    ));
}

#[rstest]
#[tokio::test]
async fn event_fetch_failure_is_not_fatal(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    harness.client.set_events(
        NAME,
        Err(ClientError::Transport {
            operation: String::from("DescribeStackEvents"),
            message: String::from("connection reset"),
        }),
    );

    created(&harness).await;

    assert!(harness.sink.contains("Unable to fetch events for stack app-stack"));
}

#[rstest]
#[tokio::test]
async fn throttled_describe_is_retried(harness: Harness) {
    harness.client.push_missing(NAME);
    harness.client.push_describe(NAME, Err(throttled()));
    harness
        .client
        .push_status(NAME, StackStatus::CreateComplete);

    created(&harness).await;

    assert_eq!(harness.client.describe_count(NAME), 3);
    assert!(harness.sink.contains("Stack status request throttled; retrying."));
}

#[rstest]
#[tokio::test]
async fn throttled_create_is_retried(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    harness.client.push_create(Err(throttled()));

    created(&harness).await;

    assert_eq!(
        harness.client.provisioned(),
        vec![NAME.to_owned(), NAME.to_owned()]
    );
    assert!(harness.sink.contains("Request for stack app-stack throttled; retrying."));
}

#[rstest]
#[tokio::test]
async fn rejected_create_stops_before_polling(harness: Harness) {
    harness.client.push_missing(NAME);
    harness.client.push_create(Err(ClientError::Rejected {
        operation: String::from("CreateStack"),
        status_code: Some(400),
        error_code: String::from("ValidationError"),
        message: String::from("Template format error"),
    }));

    let err = harness
        .lifecycle()
        .create(&spec(), &Environment::new())
        .await
        .expect_err("create should be rejected");

    assert!(matches!(err, StackError::Rejected { .. }));
    assert!(err.reason().contains("Template format error"));
    assert_eq!(harness.client.describe_count(NAME), 1);
    assert!(harness.sink.contains("Failed to submit stack app-stack"));
}

#[rstest]
#[tokio::test]
async fn update_without_changes_succeeds(harness: Harness) {
    harness
        .client
        .push_status(NAME, StackStatus::UpdateComplete);
    harness.client.push_update(Err(ClientError::NoUpdates {
        message: String::from("No updates are to be performed."),
    }));

    let handle = created(&harness).await;

    assert_eq!(handle.status, StackStatus::UpdateComplete);
    assert!(harness.sink.contains("No updates are to be performed on stack app-stack."));
}

#[rstest]
#[tokio::test]
async fn stack_vanishing_mid_create_fails(harness: Harness) {
    harness.client.push_missing(NAME);
    harness.client.push_describe(NAME, Ok(Vec::new()));

    let err = harness
        .lifecycle()
        .create(&spec(), &Environment::new())
        .await
        .expect_err("create should fail");

    assert_eq!(
        err,
        StackError::Vanished {
            name: NAME.to_owned()
        }
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn create_times_out_when_stack_never_settles(harness: Harness) {
    harness.client.push_missing(NAME);
    harness
        .client
        .push_status(NAME, StackStatus::CreateInProgress);

    let err = harness
        .lifecycle()
        .create(
            &spec_with(PollPolicy::with_timeout(Duration::from_secs(1))),
            &Environment::new(),
        )
        .await
        .expect_err("create should time out");

    assert_eq!(
        err,
        StackError::Timeout {
            name: NAME.to_owned(),
            timeout_secs: 1,
        }
    );
    assert!(err.halts_run());
    assert!(harness.sink.contains("Timed out waiting for stack app-stack after 1s."));
}

#[rstest]
#[tokio::test]
async fn disabled_timeout_keeps_polling(harness: Harness) {
    harness.client.push_missing(NAME);
    harness
        .client
        .push_status(NAME, StackStatus::CreateInProgress);
    let lifecycle = harness.lifecycle();
    let spec = spec();
    let env = Environment::new();

    let outcome =
        tokio::time::timeout(Duration::from_millis(200), lifecycle.create(&spec, &env)).await;

    assert!(outcome.is_err(), "create should still be polling");
    assert!(harness.client.describe_count(NAME) > 3);
}

#[rstest]
#[tokio::test]
async fn interrupt_during_backoff_abandons_create(harness: Harness) {
    harness.client.push_missing(NAME);
    harness
        .client
        .push_status(NAME, StackStatus::CreateInProgress);

    let err = harness
        .lifecycle()
        .with_cancel(cancel_on_first_yield())
        .create(&spec_with(PollPolicy::default()), &Environment::new())
        .await
        .expect_err("create should be interrupted");

    assert_eq!(
        err,
        StackError::Interrupted {
            name: NAME.to_owned()
        }
    );
    assert!(err.halts_run());
    assert_eq!(harness.client.provisioned(), vec![NAME.to_owned()]);
    assert!(harness.sink.contains("it may be left orphaned"));
}

#[rstest]
#[tokio::test]
async fn cancelled_lifecycle_submits_nothing(harness: Harness) {
    let (trigger, signal) = cancel_pair();
    trigger.cancel();

    let err = harness
        .lifecycle()
        .with_cancel(signal)
        .create(&spec(), &Environment::new())
        .await
        .expect_err("create should refuse to submit");

    assert_eq!(
        err,
        StackError::Interrupted {
            name: NAME.to_owned()
        }
    );
    assert!(harness.client.calls().is_empty());
    assert!(harness
        .sink
        .contains("Interrupted before submitting stack app-stack."));
}

#[rstest]
#[tokio::test]
async fn interrupt_during_quiescence_keeps_handle(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    let spec = StackSpec {
        quiescence: Duration::from_secs(60),
        ..spec()
    };

    let handle = harness
        .lifecycle()
        .with_cancel(cancel_on_first_yield())
        .create(&spec, &Environment::new())
        .await
        .expect("handle should survive the interrupt");

    assert_eq!(handle.name, NAME);
    assert!(harness.sink.contains("Waiting 60s for stack app-stack to settle."));
    assert!(harness.sink.contains("it may be left orphaned"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn quiescence_elapses_before_returning(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    let spec = StackSpec {
        quiescence: Duration::from_secs(30),
        ..spec()
    };
    let started = tokio::time::Instant::now();

    harness
        .lifecycle()
        .create(&spec, &Environment::new())
        .await
        .expect("create should succeed");

    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[rstest]
#[tokio::test]
async fn delete_waits_until_stack_is_gone(harness: Harness) {
    let deleting = description(NAME, StackStatus::DeleteInProgress);
    harness.client.push_describe_all(Ok(vec![deleting.clone()]));
    harness.client.push_describe_all(Ok(vec![deleting]));
    harness.client.push_describe_all(Ok(Vec::new()));
    let target = DeleteTarget::exact(NAME, Region::default()).with_backoff(Backoff::Immediate);

    let deleted = harness
        .lifecycle()
        .delete(&target)
        .await
        .expect("delete should succeed");

    assert_eq!(deleted, NAME);
    assert_eq!(harness.client.describe_all_count(), 3);
    assert_eq!(harness.client.deleted(), vec![NAME.to_owned()]);
    assert!(harness.sink.contains("Successfully deleted stack: app-stack"));
}

#[rstest]
#[tokio::test]
async fn delete_failure_is_reported(harness: Harness) {
    let mut failed = description(NAME, StackStatus::DeleteFailed);
    failed.status_reason = Some(String::from("Bucket not empty"));
    harness.client.push_describe_all(Ok(vec![failed]));
    let target = DeleteTarget::exact(NAME, Region::default()).with_backoff(Backoff::Immediate);

    let err = harness
        .lifecycle()
        .delete(&target)
        .await
        .expect_err("delete should fail");

    assert!(matches!(err, StackError::TerminalFailure { .. }));
    assert_eq!(harness.client.describe_all_count(), 1);
    assert!(harness
        .sink
        .contains("Failed to delete stack: app-stack. Reason: Bucket not empty"));
}

#[rstest]
#[tokio::test]
async fn prefix_delete_targets_oldest_running_stack(harness: Harness) {
    harness.client.set_running(vec![
        summary("app-new", StackStatus::CreateComplete, 2_000),
        summary("app-old", StackStatus::UpdateComplete, 1_000),
        summary("other", StackStatus::CreateComplete, 10),
    ]);
    let target =
        DeleteTarget::oldest_with_prefix("app-", Region::default()).with_backoff(Backoff::Immediate);

    let deleted = harness
        .lifecycle()
        .delete(&target)
        .await
        .expect("delete should succeed");

    assert_eq!(deleted, "app-old");
    assert_eq!(harness.client.deleted(), vec![String::from("app-old")]);
    assert!(harness.client.calls().contains(&ClientCall::List));
}

#[rstest]
#[tokio::test]
async fn teardown_marks_handle_deleted(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    let mut handle = created(&harness).await;

    harness
        .lifecycle()
        .teardown(&mut handle, Backoff::Immediate)
        .await
        .expect("teardown should succeed");

    assert!(handle.is_deleted());
    assert_eq!(handle.status, StackStatus::DeleteComplete);
}

#[rstest]
#[tokio::test]
async fn teardown_ignores_provisioning_interrupt(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    let mut handle = created(&harness).await;
    harness
        .client
        .push_describe_all(Ok(vec![description(NAME, StackStatus::DeleteInProgress)]));
    harness.client.push_describe_all(Ok(Vec::new()));
    let (trigger, signal) = cancel_pair();
    trigger.cancel();

    harness
        .lifecycle()
        .with_cancel(signal)
        .teardown(&mut handle, Backoff::Immediate)
        .await
        .expect("teardown should finish despite the interrupt");

    assert!(handle.is_deleted());
    assert_eq!(harness.client.describe_all_count(), 2);
    assert!(!harness.sink.contains("it may be left orphaned"));
}

#[rstest]
#[tokio::test]
async fn teardown_signal_interrupts_delete_wait(harness: Harness) {
    harness
        .client
        .script_create(NAME, &[StackStatus::CreateComplete], &[]);
    let mut handle = created(&harness).await;
    harness
        .client
        .push_describe_all(Ok(vec![description(NAME, StackStatus::DeleteInProgress)]));
    let (trigger, signal) = cancel_pair();
    trigger.cancel();

    let err = harness
        .lifecycle()
        .with_teardown_cancel(signal)
        .teardown(&mut handle, Backoff::Immediate)
        .await
        .expect_err("teardown should be interrupted");

    assert!(matches!(err, StackError::Interrupted { .. }));
    assert!(!handle.is_deleted());
    assert_eq!(harness.client.deleted(), vec![NAME.to_owned()]);
}
