//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("stackpilot");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("up"))
        .stdout(contains("down"));
}

#[test]
fn no_arguments_prints_help_and_fails() {
    let mut cmd = cargo_bin_cmd!("stackpilot");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn missing_job_file_is_reported() {
    let mut cmd = cargo_bin_cmd!("stackpilot");
    cmd.args(["up", "--job", "does-not-exist.toml"])
        .assert()
        .code(1)
        .stderr(contains("failed to read job file does-not-exist.toml"));
}
