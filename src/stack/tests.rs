//! Unit tests for the stack model.

use std::time::Duration;

use rstest::rstest;

use super::*;

#[rstest]
#[case("CREATE_IN_PROGRESS", StackStatus::CreateInProgress)]
#[case("UPDATE_COMPLETE", StackStatus::UpdateComplete)]
#[case(" DELETE_FAILED ", StackStatus::DeleteFailed)]
#[case("ROLLBACK_COMPLETE", StackStatus::RollbackComplete)]
#[case(
    "UPDATE_ROLLBACK_IN_PROGRESS",
    StackStatus::Unknown(String::from("UPDATE_ROLLBACK_IN_PROGRESS"))
)]
fn parses_provider_statuses(#[case] raw: &str, #[case] expected: StackStatus) {
    assert_eq!(StackStatus::parse(raw), expected);
}

#[test]
fn only_create_and_update_complete_are_successful() {
    let successful = [
        StackStatus::CreateComplete,
        StackStatus::UpdateComplete,
    ];
    let others = [
        StackStatus::CreateInProgress,
        StackStatus::UpdateInProgress,
        StackStatus::CreateFailed,
        StackStatus::DeleteInProgress,
        StackStatus::DeleteComplete,
        StackStatus::DeleteFailed,
        StackStatus::RollbackComplete,
        StackStatus::Unknown(String::from("IMPORT_COMPLETE")),
    ];

    assert!(successful.iter().all(StackStatus::is_successful));
    assert!(!others.iter().any(StackStatus::is_successful));
}

#[rstest]
#[case(StackStatus::CreateInProgress, false)]
#[case(StackStatus::DeleteInProgress, false)]
#[case(StackStatus::Unknown(String::from("ROLLBACK_IN_PROGRESS")), false)]
#[case(StackStatus::CreateFailed, true)]
#[case(StackStatus::RollbackComplete, true)]
#[case(StackStatus::Unknown(String::from("ROLLBACK_FAILED")), true)]
fn classifies_terminal_states(#[case] status: StackStatus, #[case] terminal: bool) {
    assert_eq!(status.is_terminal(), terminal, "status {status}");
}

#[test]
fn running_filter_lists_the_running_statuses() {
    assert!(StackStatus::running_filter().iter().all(StackStatus::is_running));
}

#[rstest]
#[case(1, Duration::from_millis(200))]
#[case(3, Duration::from_millis(800))]
#[case(12, Duration::from_millis(300_000))]
#[case(40, Duration::from_millis(300_000))]
fn exponential_backoff_is_capped(#[case] attempt: u32, #[case] expected: Duration) {
    assert_eq!(Backoff::default().delay(attempt), expected);
}

#[test]
fn sentinel_disables_timeout_and_delay() {
    let policy = PollPolicy::from_seconds(DISABLED_TIMEOUT_SENTINEL);

    assert_eq!(policy.timeout, None);
    assert_eq!(policy.backoff.delay(5), Duration::ZERO);
    assert_eq!(policy.timeout_secs(), 0);
}

#[rstest]
#[case(0, 300)]
#[case(-5, 300)]
#[case(120, 300)]
#[case(900, 900)]
fn configured_timeout_respects_floor(#[case] seconds: i64, #[case] expected: u64) {
    assert_eq!(PollPolicy::from_seconds(seconds).timeout_secs(), expected);
}

#[rstest]
#[case("https://bucket.s3.amazonaws.com/app.json", true)]
#[case("HTTP://example.com/app.yaml", true)]
#[case("templates/app.json", false)]
#[case("ftp://example.com/app.json", false)]
#[case("http", false)]
fn detects_template_urls(#[case] reference: &str, #[case] expected: bool) {
    assert_eq!(TemplateSource::is_url(reference), expected);
}

#[test]
fn builder_applies_defaults() {
    let spec = StackSpec::builder()
        .name("  app-${BUILD}  ")
        .template(TemplateSource::Body(String::from("{}")))
        .build()
        .expect("spec should build");

    assert_eq!(spec.name, "app-${BUILD}");
    assert_eq!(spec.region.as_str(), DEFAULT_REGION);
    assert_eq!(spec.capability, Capability::Iam);
    assert_eq!(spec.poll, PollPolicy::default());
    assert!(spec.auto_delete);
    assert!(!spec.fail_cascade);
    assert!(spec.parameters.is_none());
}

#[rstest]
#[case(StackSpec::builder().template(TemplateSource::Body(String::from("{}"))), "name")]
#[case(StackSpec::builder().name("app"), "template")]
#[case(StackSpec::builder().name("app").template(TemplateSource::Url(String::from(" "))), "template")]
#[case(
    StackSpec::builder().name("app").region(" ").template(TemplateSource::Body(String::from("{}"))),
    "region"
)]
fn builder_rejects_missing_fields(#[case] builder: StackSpecBuilder, #[case] field: &str) {
    let err = builder.build().expect_err("spec should be rejected");
    assert_eq!(err, SpecError::Validation(field.to_owned()));
}

#[test]
fn output_set_prefixes_keys_with_stack_name() {
    let outputs = [
        StackOutput {
            key: String::from("BucketName"),
            value: String::from("assets-123"),
            description: None,
        },
        StackOutput {
            key: String::from("Endpoint"),
            value: String::from("https://api.example.com"),
            description: Some(String::from("public endpoint")),
        },
    ];

    let set = OutputSet::from_outputs("app-prod", &outputs);

    assert_eq!(set.len(), 2);
    assert_eq!(set.get("app-prod_BucketName"), Some("assets-123"));
    assert_eq!(set.get("app-prod_Endpoint"), Some("https://api.example.com"));
    assert_eq!(set.get("BucketName"), None);
}

#[test]
fn event_render_matches_operator_format() {
    let event = StackEvent {
        id: String::from("evt-1"),
        resource_type: String::from("AWS::S3::Bucket"),
        status: String::from("CREATE_FAILED"),
        reason: Some(String::from("bucket exists")),
        timestamp: None,
    };

    assert_eq!(
        event.render(),
        "evt-1 - AWS::S3::Bucket - CREATE_FAILED - bucket exists"
    );
}

#[test]
fn timeouts_and_interrupts_halt_runs() {
    let timeout = StackError::Timeout {
        name: String::from("app"),
        timeout_secs: 300,
    };
    let terminal = StackError::TerminalFailure {
        name: String::from("app"),
        status: StackStatus::CreateFailed,
        reason: String::from("boom"),
    };

    assert!(timeout.halts_run());
    assert!(
        StackError::Interrupted {
            name: String::from("app")
        }
        .halts_run()
    );
    assert!(!terminal.halts_run());
    assert_eq!(terminal.reason(), "CREATE_FAILED: boom");
}
