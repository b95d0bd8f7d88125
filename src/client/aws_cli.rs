//! [`RemoteStackClient`] backed by the `aws` command-line tool.
//!
//! Every call runs `aws cloudformation <operation> --region <region>
//! --output json` through a [`CommandRunner`] and parses stdout. Failures are
//! classified from the CLI's `An error occurred (<Code>) when calling the
//! <Operation> operation: <message>` stderr line.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::command::{CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::config::Credentials;
use crate::stack::{
    Region, StackDescription, StackEvent, StackStatus, StackSummary, TemplateSource,
};

use super::wire::{
    DescribeEventsResponse, DescribeStacksResponse, ListStacksResponse, StackIdResponse,
};
use super::{ClientError, ClientFuture, RemoteStackClient, StackRequest};

/// Default AWS CLI binary name.
pub const DEFAULT_AWS_BIN: &str = "aws";

const THROTTLING_CODES: [&str; 5] = [
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "RequestThrottled",
];

#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal and is covered by unit tests"
)]
static CLI_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"An error occurred \(([A-Za-z0-9.]+)\) when calling the (\w+) operation(?: \([^)]*\))?: (.*)",
    )
    .expect("CLI error pattern should compile")
});

/// Shells out to `aws cloudformation`.
#[derive(Clone, Debug)]
pub struct AwsCliClient<R: CommandRunner> {
    runner: R,
    cli_bin: String,
    envs: BTreeMap<String, String>,
}

impl AwsCliClient<ProcessCommandRunner> {
    /// Creates a client wired to the real process runner.
    #[must_use]
    pub fn with_process_runner(cli_bin: impl Into<String>, credentials: Option<&Credentials>) -> Self {
        Self::new(ProcessCommandRunner, cli_bin, credentials)
    }
}

impl<R: CommandRunner> AwsCliClient<R> {
    /// Creates a client using `runner`.
    ///
    /// When `credentials` are supplied they are passed to the CLI through
    /// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`; otherwise the CLI's
    /// own credential chain applies.
    #[must_use]
    pub fn new(runner: R, cli_bin: impl Into<String>, credentials: Option<&Credentials>) -> Self {
        let mut envs = BTreeMap::from([(String::from("AWS_PAGER"), String::new())]);
        if let Some(creds) = credentials {
            envs.insert(
                String::from("AWS_ACCESS_KEY_ID"),
                creds.access_key_id.clone(),
            );
            envs.insert(
                String::from("AWS_SECRET_ACCESS_KEY"),
                creds.secret_access_key.clone(),
            );
        }
        Self {
            runner,
            cli_bin: cli_bin.into(),
            envs,
        }
    }

    fn invoke(
        &self,
        operation: &str,
        region: &Region,
        extra: Vec<OsString>,
    ) -> Result<String, ClientError> {
        let mut args: Vec<OsString> = vec![
            OsString::from("cloudformation"),
            OsString::from(operation),
            OsString::from("--region"),
            OsString::from(region.as_str()),
            OsString::from("--output"),
            OsString::from("json"),
        ];
        args.extend(extra);

        debug!(program = %self.cli_bin, operation, region = %region, "invoking provider CLI");
        let output = self
            .runner
            .run(&self.cli_bin, &args, &self.envs)
            .map_err(|err| ClientError::Transport {
                operation: operation.to_owned(),
                message: err.to_string(),
            })?;

        if output.is_success() {
            Ok(output.stdout)
        } else {
            Err(classify(operation, &output))
        }
    }

    fn invoke_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        region: &Region,
        extra: Vec<OsString>,
    ) -> Result<T, ClientError> {
        let stdout = self.invoke(operation, region, extra)?;
        serde_json::from_str(&stdout).map_err(|err| ClientError::Parse {
            operation: operation.to_owned(),
            message: err.to_string(),
        })
    }

    fn submit(&self, operation: &str, request: &StackRequest) -> Result<String, ClientError> {
        let mut extra = vec![
            OsString::from("--stack-name"),
            OsString::from(&request.name),
        ];
        match &request.template {
            TemplateSource::Body(body) => {
                extra.push(OsString::from("--template-body"));
                extra.push(OsString::from(body));
            }
            TemplateSource::Url(url) => {
                extra.push(OsString::from("--template-url"));
                extra.push(OsString::from(url));
            }
        }
        if let Some(parameters) = &request.parameters {
            let encoded = serde_json::to_string(parameters).map_err(|err| ClientError::Parse {
                operation: operation.to_owned(),
                message: err.to_string(),
            })?;
            extra.push(OsString::from("--parameters"));
            extra.push(OsString::from(encoded));
        }
        extra.push(OsString::from("--capabilities"));
        extra.push(OsString::from(request.capability.as_str()));
        extra.push(OsString::from("--client-request-token"));
        extra.push(OsString::from(format!("stackpilot-{}", Uuid::new_v4())));

        let response: StackIdResponse = self.invoke_json(operation, &request.region, extra)?;
        Ok(response.stack_id)
    }
}

fn classify(operation: &str, output: &CommandOutput) -> ClientError {
    let stderr = output.stderr.trim();
    let Some(caps) = CLI_ERROR.captures(stderr) else {
        let status_text = output
            .code
            .map_or_else(|| String::from("signal"), |code| code.to_string());
        return ClientError::Transport {
            operation: operation.to_owned(),
            message: format!("exited with status {status_text}: {stderr}"),
        };
    };

    let code = caps.get(1).map_or("", |m| m.as_str());
    let api_operation = caps.get(2).map_or(operation, |m| m.as_str());
    let message = caps.get(3).map_or("", |m| m.as_str()).trim().to_owned();

    if THROTTLING_CODES.contains(&code) {
        ClientError::Throttled {
            operation: api_operation.to_owned(),
            message,
        }
    } else if code == "ValidationError" && message.contains("does not exist") {
        ClientError::NotFound { message }
    } else if message.contains("No updates are to be performed") {
        ClientError::NoUpdates { message }
    } else {
        ClientError::Rejected {
            operation: api_operation.to_owned(),
            status_code: None,
            error_code: code.to_owned(),
            message,
        }
    }
}

impl<R: CommandRunner> RemoteStackClient for AwsCliClient<R> {
    fn create_stack<'a>(&'a self, request: &'a StackRequest) -> ClientFuture<'a, String> {
        Box::pin(async move { self.submit("create-stack", request) })
    }

    fn update_stack<'a>(&'a self, request: &'a StackRequest) -> ClientFuture<'a, String> {
        Box::pin(async move { self.submit("update-stack", request) })
    }

    fn describe_stacks<'a>(
        &'a self,
        region: &'a Region,
        name: Option<&'a str>,
    ) -> ClientFuture<'a, Vec<StackDescription>> {
        Box::pin(async move {
            let extra = name.map_or_else(Vec::new, |stack| {
                vec![OsString::from("--stack-name"), OsString::from(stack)]
            });
            let response: DescribeStacksResponse =
                self.invoke_json("describe-stacks", region, extra)?;
            Ok(response
                .stacks
                .into_iter()
                .map(StackDescription::from)
                .collect())
        })
    }

    fn delete_stack<'a>(&'a self, region: &'a Region, name: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            self.invoke(
                "delete-stack",
                region,
                vec![OsString::from("--stack-name"), OsString::from(name)],
            )
            .map(|_| ())
        })
    }

    fn describe_stack_events<'a>(
        &'a self,
        region: &'a Region,
        name: &'a str,
    ) -> ClientFuture<'a, Vec<StackEvent>> {
        Box::pin(async move {
            let response: DescribeEventsResponse = self.invoke_json(
                "describe-stack-events",
                region,
                vec![OsString::from("--stack-name"), OsString::from(name)],
            )?;
            Ok(response
                .stack_events
                .into_iter()
                .map(StackEvent::from)
                .collect())
        })
    }

    fn list_stacks<'a>(
        &'a self,
        region: &'a Region,
        filter: &'a [StackStatus],
    ) -> ClientFuture<'a, Vec<StackSummary>> {
        Box::pin(async move {
            let mut extra = Vec::with_capacity(filter.len() + 1);
            if !filter.is_empty() {
                extra.push(OsString::from("--stack-status-filter"));
                extra.extend(filter.iter().map(|status| OsString::from(status.as_str())));
            }
            let response: ListStacksResponse = self.invoke_json("list-stacks", region, extra)?;
            Ok(response
                .stack_summaries
                .into_iter()
                .map(StackSummary::from)
                .collect())
        })
    }
}
