//! Delete flow, including prefix selection.

use chrono::Utc;
use tokio::time::Instant;

use crate::client::RemoteStackClient;
use crate::naming;
use crate::stack::{Backoff, StackError, StackHandle, StackStatus};

use super::{CancelSignal, DeleteTarget, StackLifecycle};

impl<C: RemoteStackClient> StackLifecycle<C> {
    /// Deletes the target stack and waits until it is gone.
    ///
    /// In prefix mode the oldest running stack whose name starts with the
    /// target name is deleted; with fewer than two candidates the prefix
    /// itself is used as the name. Returns the name actually deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StackError`] when the provider rejects the delete, the stack
    /// reports `DELETE_FAILED`, or an interrupt arrives while waiting.
    pub async fn delete(&self, target: &DeleteTarget) -> Result<String, StackError> {
        self.delete_watching(target, &self.cancel).await
    }

    /// Deletes the stack behind `handle` and records the deletion on it.
    ///
    /// Waits are interrupted only by the teardown signal, never by the one
    /// that stops provisioning.
    ///
    /// # Errors
    ///
    /// Returns [`StackError`] as [`StackLifecycle::delete`] does.
    pub async fn teardown(
        &self,
        handle: &mut StackHandle,
        backoff: Backoff,
    ) -> Result<(), StackError> {
        let target = DeleteTarget::exact(handle.name.clone(), handle.region.clone())
            .with_backoff(backoff);
        self.delete_watching(&target, &self.teardown_cancel).await?;
        handle.mark_deleted(Utc::now());
        Ok(())
    }

    async fn delete_watching(
        &self,
        target: &DeleteTarget,
        cancel: &CancelSignal,
    ) -> Result<String, StackError> {
        let policy = target.policy();
        let started = Instant::now();
        let name = if target.select_by_prefix {
            self.resolve_prefix(target, cancel).await?
        } else {
            target.name.clone()
        };

        self.say(&format!("Deleting stack: {name}"));
        let outcome = self
            .until_unthrottled(&name, policy, started, cancel, || {
                self.client.delete_stack(&target.region, &name)
            })
            .await?;
        if let Err(err) = outcome {
            self.say(&format!("Failed to delete stack {name}: {}", err.detail()));
            return Err(StackError::from_client(&name, err));
        }

        self.await_deleted(&name, &target.region, policy, cancel)
            .await?;
        self.say(&format!("Successfully deleted stack: {name}"));
        Ok(name)
    }

    async fn resolve_prefix(
        &self,
        target: &DeleteTarget,
        cancel: &CancelSignal,
    ) -> Result<String, StackError> {
        let filter = StackStatus::running_filter();
        let outcome = self
            .until_unthrottled(&target.name, target.policy(), Instant::now(), cancel, || {
                self.client.list_stacks(&target.region, &filter)
            })
            .await?;
        let running = outcome.map_err(|err| {
            self.say(&format!("Failed to list stacks: {}", err.detail()));
            StackError::from_client(&target.name, err)
        })?;
        let resolved = naming::resolve_oldest_with_prefix(&target.name, &running);
        self.say(&format!(
            "Resolved prefix {} to stack {resolved}.",
            target.name
        ));
        Ok(resolved)
    }
}
