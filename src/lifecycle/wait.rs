//! Poll loops and backoff shared by create and delete.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::client::{ClientError, ClientFuture, RemoteStackClient};
use crate::stack::{PollPolicy, Region, StackDescription, StackError, StackStatus};

use super::{CancelSignal, StackLifecycle};

impl<C: RemoteStackClient> StackLifecycle<C> {
    /// Sleeps between attempts, converting a fired `cancel` into
    /// [`StackError::Interrupted`].
    pub(super) async fn pause(
        &self,
        name: &str,
        wait: Duration,
        cancel: &CancelSignal,
    ) -> Result<(), StackError> {
        debug!(stack = name, wait_ms = wait.as_millis(), "backing off");
        match cancel.sleep(wait).await {
            Ok(()) => Ok(()),
            Err(_) => Err(self.interrupted(name)),
        }
    }

    /// Repeats `call` while the provider throttles it.
    ///
    /// The outer error aborts the lifecycle (timeout or interrupt); the inner
    /// result is the first unthrottled answer.
    pub(super) async fn until_unthrottled<'c, T, F>(
        &self,
        name: &str,
        policy: PollPolicy,
        started: Instant,
        cancel: &CancelSignal,
        mut call: F,
    ) -> Result<Result<T, ClientError>, StackError>
    where
        F: FnMut() -> ClientFuture<'c, T>,
    {
        let mut attempt = 0_u32;
        loop {
            match call().await {
                Err(err) if err.is_throttling() => {
                    self.say(&format!("Request for stack {name} throttled; retrying."));
                    self.check_timeout(name, policy, started)?;
                    attempt = attempt.saturating_add(1);
                    self.pause(name, policy.backoff.delay(attempt), cancel)
                        .await?;
                }
                other => return Ok(other),
            }
        }
    }

    /// Polls `name` until it leaves every in-progress state.
    ///
    /// Returns the final description whether it succeeded or failed; the
    /// caller decides what a failed terminal state means.
    pub(super) async fn await_terminal(
        &self,
        name: &str,
        region: &Region,
        policy: PollPolicy,
        started: Instant,
    ) -> Result<StackDescription, StackError> {
        let mut attempt = 0_u32;
        let mut last_check = Instant::now();
        loop {
            let since = last_check.elapsed();
            last_check = Instant::now();
            match self.client.describe_stacks(region, Some(name)).await {
                Ok(stacks) => {
                    let Some(stack) = stacks.into_iter().find(|stack| stack.name == name) else {
                        return Err(self.vanished(name));
                    };
                    self.say(&format!(
                        "Stack status {}. ({}ms since previous check)",
                        stack.status,
                        since.as_millis()
                    ));
                    if stack.status.is_terminal() {
                        return Ok(stack);
                    }
                }
                Err(err) if err.is_throttling() => {
                    self.say("Stack status request throttled; retrying.");
                }
                Err(err) if err.is_not_found() => return Err(self.vanished(name)),
                Err(err) => {
                    self.say(&format!("Failed to describe stack {name}: {}", err.detail()));
                    return Err(StackError::from_client(name, err));
                }
            }

            self.check_timeout(name, policy, started)?;
            attempt = attempt.saturating_add(1);
            self.pause(name, policy.backoff.delay(attempt), &self.cancel)
                .await?;
        }
    }

    /// Polls every stack in the region until `name` is gone or has finished
    /// deleting. No timeout applies; only `cancel` ends the wait early.
    pub(super) async fn await_deleted(
        &self,
        name: &str,
        region: &Region,
        policy: PollPolicy,
        cancel: &CancelSignal,
    ) -> Result<(), StackError> {
        let mut attempt = 0_u32;
        loop {
            match self.client.describe_stacks(region, None).await {
                Ok(stacks) => match stacks.into_iter().find(|stack| stack.name == name) {
                    None => return Ok(()),
                    Some(stack) if stack.status == StackStatus::DeleteComplete => return Ok(()),
                    Some(stack) if stack.status == StackStatus::DeleteFailed => {
                        let reason = stack.status_reason.unwrap_or_default();
                        self.say(&format!(
                            "Failed to delete stack: {name}. Reason: {reason}"
                        ));
                        return Err(StackError::TerminalFailure {
                            name: name.to_owned(),
                            status: stack.status,
                            reason,
                        });
                    }
                    Some(stack) => self.say(&format!("Stack status {}.", stack.status)),
                },
                Err(err) if err.is_throttling() => {
                    self.say("Stack status request throttled; retrying.");
                }
                Err(err) => {
                    self.say(&format!("Failed to describe stacks: {}", err.detail()));
                    return Err(StackError::from_client(name, err));
                }
            }

            attempt = attempt.saturating_add(1);
            self.pause(name, policy.backoff.delay(attempt), cancel).await?;
        }
    }

    fn vanished(&self, name: &str) -> StackError {
        self.say(&format!(
            "Stack {name} disappeared before reaching a terminal state."
        ));
        StackError::Vanished {
            name: name.to_owned(),
        }
    }
}
