//! Single-stack lifecycle: create or update, poll to a terminal state,
//! report events, extract outputs, and delete.
//!
//! Every wait goes through a [`CancelSignal`], so an interrupt delivered
//! while the lifecycle is backing off abandons the operation with an
//! orphaned-stack warning instead of leaving the caller blocked. Deletes
//! issued by [`StackLifecycle::teardown`] watch a separate signal so that
//! the interrupt which stopped provisioning does not also stop cleanup.

use tokio::time::Instant;
use tracing::warn;

use crate::client::RemoteStackClient;
use crate::log::SharedSink;
use crate::stack::{Backoff, PollPolicy, Region, StackError};

mod cancel;
mod create;
mod delete;
mod wait;

pub use cancel::{CancelSignal, CancelTrigger, Interrupted, cancel_pair};

/// What to delete and how to find it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteTarget {
    /// Exact stack name, or the prefix when `select_by_prefix` is set.
    pub name: String,
    /// Region the stack lives in.
    pub region: Region,
    /// Delete the oldest running stack whose name starts with `name`.
    pub select_by_prefix: bool,
    /// Delay strategy while waiting for deletion.
    pub backoff: Backoff,
}

impl DeleteTarget {
    /// Targets one stack by its exact name.
    #[must_use]
    pub fn exact(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            region,
            select_by_prefix: false,
            backoff: Backoff::default(),
        }
    }

    /// Targets the oldest running stack whose name starts with `prefix`.
    #[must_use]
    pub fn oldest_with_prefix(prefix: impl Into<String>, region: Region) -> Self {
        Self {
            select_by_prefix: true,
            ..Self::exact(prefix, region)
        }
    }

    /// Overrides the delay strategy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    const fn policy(&self) -> PollPolicy {
        PollPolicy {
            timeout: None,
            backoff: self.backoff,
        }
    }
}

/// Drives one stack at a time against a [`RemoteStackClient`].
pub struct StackLifecycle<C> {
    client: C,
    sink: SharedSink,
    cancel: CancelSignal,
    teardown_cancel: CancelSignal,
}

impl<C: RemoteStackClient> StackLifecycle<C> {
    /// Creates a lifecycle that is never interrupted.
    #[must_use]
    pub fn new(client: C, sink: SharedSink) -> Self {
        Self {
            client,
            sink,
            cancel: CancelSignal::never(),
            teardown_cancel: CancelSignal::never(),
        }
    }

    /// Wires an interrupt signal into create, update and direct deletes.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Wires the signal that interrupts [`StackLifecycle::teardown`].
    ///
    /// Without one, teardown deletes always run to completion.
    #[must_use]
    pub fn with_teardown_cancel(mut self, cancel: CancelSignal) -> Self {
        self.teardown_cancel = cancel;
        self
    }

    /// Whether the provisioning signal has fired.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Borrows the client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Borrows the progress sink.
    #[must_use]
    pub const fn sink(&self) -> &SharedSink {
        &self.sink
    }

    fn say(&self, message: &str) {
        self.sink.line(message);
    }

    fn interrupted(&self, name: &str) -> StackError {
        self.warn_orphan(name);
        StackError::Interrupted {
            name: name.to_owned(),
        }
    }

    fn warn_orphan(&self, name: &str) {
        warn!(stack = name, "interrupted while waiting on stack");
        self.say(&format!(
            "Interrupted while waiting on stack {name}; it may be left orphaned in the remote account."
        ));
    }

    fn check_timeout(
        &self,
        name: &str,
        policy: PollPolicy,
        started: Instant,
    ) -> Result<(), StackError> {
        let Some(limit) = policy.timeout else {
            return Ok(());
        };
        if started.elapsed() <= limit {
            return Ok(());
        }
        let timeout_secs = policy.timeout_secs();
        self.say(&format!(
            "Timed out waiting for stack {name} after {timeout_secs}s."
        ));
        Err(StackError::Timeout {
            name: name.to_owned(),
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests;
