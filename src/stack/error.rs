//! Failures surfaced by a single stack lifecycle.

use thiserror::Error;

use crate::client::ClientError;

use super::StackStatus;

/// Errors raised while creating or deleting one stack.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StackError {
    /// The provider refused a call outright.
    #[error("stack {name} was rejected by the provider: {source}")]
    Rejected {
        /// Expanded stack name.
        name: String,
        /// Provider rejection.
        #[source]
        source: ClientError,
    },
    /// The call never reached a provider decision.
    #[error("stack {name} could not be reached: {source}")]
    Client {
        /// Expanded stack name.
        name: String,
        /// Transport or parse failure.
        #[source]
        source: ClientError,
    },
    /// The operation finished in a failed state.
    #[error("stack {name} finished with status {status}: {reason}")]
    TerminalFailure {
        /// Expanded stack name.
        name: String,
        /// Final status.
        status: StackStatus,
        /// Provider status reason.
        reason: String,
    },
    /// Polling exceeded the configured budget.
    #[error("stack {name} did not finish within the {timeout_secs}s timeout")]
    Timeout {
        /// Expanded stack name.
        name: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The stack disappeared while it was being created or updated.
    #[error("stack {name} disappeared before reaching a terminal state")]
    Vanished {
        /// Expanded stack name.
        name: String,
    },
    /// An interrupt arrived while waiting on the provider.
    #[error("waiting on stack {name} was interrupted; the stack may be orphaned")]
    Interrupted {
        /// Expanded stack name.
        name: String,
    },
}

impl StackError {
    /// Classifies a client failure for the named stack.
    #[must_use]
    pub fn from_client(name: &str, source: ClientError) -> Self {
        let owned = name.to_owned();
        if source.is_rejection() {
            Self::Rejected {
                name: owned,
                source,
            }
        } else {
            Self::Client {
                name: owned,
                source,
            }
        }
    }

    /// Returns `true` for failures that stop a multi-stack run regardless of
    /// its cascade settings.
    #[must_use]
    pub const fn halts_run(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Interrupted { .. })
    }

    /// Name of the stack the failure refers to.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        match self {
            Self::Rejected { name, .. }
            | Self::Client { name, .. }
            | Self::TerminalFailure { name, .. }
            | Self::Timeout { name, .. }
            | Self::Vanished { name }
            | Self::Interrupted { name } => name,
        }
    }

    /// Operator-facing reason, including provider detail for rejections.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Rejected { source, .. } => source.detail(),
            Self::TerminalFailure { status, reason, .. } => format!("{status}: {reason}"),
            other => other.to_string(),
        }
    }
}
