//! Create-or-update flow.

use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;

use crate::client::{ClientError, RemoteStackClient, StackRequest};
use crate::env::Environment;
use crate::naming;
use crate::stack::{OutputSet, PollPolicy, Region, StackError, StackHandle, StackSpec};

use super::StackLifecycle;

impl<C: RemoteStackClient> StackLifecycle<C> {
    /// Creates the stack described by `spec`, or updates it when a stack of
    /// the same expanded name already exists, and waits for the result.
    ///
    /// On success the event history is logged in chronological order, the
    /// outputs are collected under `<stackName>_<key>`, and the configured
    /// quiescence pause elapses before returning. An interrupt during that
    /// pause is logged but the handle is still returned so the stack can be
    /// torn down.
    ///
    /// # Errors
    ///
    /// Returns [`StackError`] when the provider rejects the request, the
    /// stack ends in a failed state, polling exceeds the timeout, or an
    /// interrupt arrives while waiting.
    pub async fn create(
        &self,
        spec: &StackSpec,
        env: &Environment,
    ) -> Result<StackHandle, StackError> {
        let name = naming::expand(&spec.name, env);
        let started = Instant::now();
        let request = StackRequest::from_spec(spec, name.as_str());

        let submitted_id = self.submit(&request, spec.poll, started).await?;
        let created_at = Utc::now();

        let description = self
            .await_terminal(&name, &spec.region, spec.poll, started)
            .await?;
        self.report_events(&name, &spec.region).await;

        if !description.status.is_successful() {
            let reason = description.status_reason.unwrap_or_default();
            self.say(&format!("Failed to create stack: {name}. Reason: {reason}"));
            return Err(StackError::TerminalFailure {
                name,
                status: description.status,
                reason,
            });
        }

        let outputs = OutputSet::from_outputs(&name, &description.outputs);
        self.say(&format!("Successfully created stack: {name}"));
        let id = if description.id.is_empty() {
            submitted_id
        } else {
            description.id
        };
        let handle = StackHandle {
            name,
            id,
            region: spec.region.clone(),
            status: description.status,
            outputs,
            created_at,
            deleted_at: None,
        };

        if !spec.quiescence.is_zero() {
            self.say(&format!(
                "Waiting {}s for stack {} to settle.",
                spec.quiescence.as_secs(),
                handle.name
            ));
            if self.cancel.sleep(spec.quiescence).await.is_err() {
                self.warn_orphan(&handle.name);
            }
        }

        Ok(handle)
    }

    /// Decides between create and update, then submits with throttle retry.
    ///
    /// Nothing is submitted once the cancel signal has fired, so an
    /// interrupted run never creates a stack it will not wait for.
    async fn submit(
        &self,
        request: &StackRequest,
        policy: PollPolicy,
        started: Instant,
    ) -> Result<String, StackError> {
        let name = request.name.as_str();
        if self.cancel.is_cancelled() {
            self.say(&format!("Interrupted before submitting stack {name}."));
            return Err(StackError::Interrupted {
                name: name.to_owned(),
            });
        }
        let existing = self.find_existing(name, &request.region).await;

        let outcome = if existing.is_some() {
            self.say(&format!("Updating stack: {name}"));
            self.until_unthrottled(name, policy, started, &self.cancel, || {
                self.client.update_stack(request)
            })
            .await?
        } else {
            self.say(&format!("Creating stack: {name}"));
            self.until_unthrottled(name, policy, started, &self.cancel, || {
                self.client.create_stack(request)
            })
            .await?
        };

        match (outcome, existing) {
            (Ok(id), _) => Ok(id),
            (Err(ClientError::NoUpdates { .. }), Some(id)) => {
                self.say(&format!("No updates are to be performed on stack {name}."));
                Ok(id)
            }
            (Err(err), _) => {
                self.say(&format!("Failed to submit stack {name}: {}", err.detail()));
                Err(StackError::from_client(name, err))
            }
        }
    }

    /// Returns the provider id of an existing stack named `name`.
    ///
    /// Any describe failure, not only "does not exist", is treated as
    /// absence so the create call surfaces the real problem.
    async fn find_existing(&self, name: &str, region: &Region) -> Option<String> {
        match self.client.describe_stacks(region, Some(name)).await {
            Ok(stacks) => stacks
                .into_iter()
                .find(|stack| stack.name == name)
                .map(|stack| stack.id),
            Err(err) => {
                debug!(stack = name, error = %err, "describe before create failed");
                if !err.is_not_found() {
                    self.say(&format!("Stack not found: {name}. {err}"));
                }
                None
            }
        }
    }

    /// Logs the stack's event history, oldest first. Failures to fetch
    /// events are logged and otherwise ignored.
    async fn report_events(&self, name: &str, region: &Region) {
        match self.client.describe_stack_events(region, name).await {
            Ok(mut events) => {
                events.reverse();
                for event in &events {
                    self.say(&event.render());
                }
            }
            Err(err) => self.say(&format!("Unable to fetch events for stack {name}: {err}")),
        }
    }
}
