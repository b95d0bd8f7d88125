//! Errors reported by remote stack clients.

use thiserror::Error;

/// Failure of a single provider call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// The provider refused the request.
    #[error("{operation} was rejected ({error_code}): {message}")]
    Rejected {
        /// Provider operation name.
        operation: String,
        /// HTTP status code, when the transport exposes it.
        status_code: Option<u16>,
        /// Provider error code (for example `ValidationError`).
        error_code: String,
        /// Provider error message.
        message: String,
    },
    /// The provider rate-limited the request; retrying later may succeed.
    #[error("{operation} was throttled: {message}")]
    Throttled {
        /// Provider operation name.
        operation: String,
        /// Provider error message.
        message: String,
    },
    /// The named stack does not exist.
    #[error("stack not found: {message}")]
    NotFound {
        /// Provider error message.
        message: String,
    },
    /// An update found nothing to change.
    #[error("no updates are to be performed: {message}")]
    NoUpdates {
        /// Provider error message.
        message: String,
    },
    /// The call failed before the provider answered.
    #[error("{operation} failed: {message}")]
    Transport {
        /// Provider operation name.
        operation: String,
        /// Failure description.
        message: String,
    },
    /// The provider answered with something that could not be parsed.
    #[error("failed to parse {operation} response: {message}")]
    Parse {
        /// Provider operation name.
        operation: String,
        /// Parser error message.
        message: String,
    },
}

impl ClientError {
    /// Returns `true` for rate-limit responses.
    #[must_use]
    pub const fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// Returns `true` when the stack does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when the provider made a decision about the request,
    /// as opposed to transport or parse failures.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::NotFound { .. } | Self::NoUpdates { .. }
        )
    }

    /// Multi-line rendering with the provider's status and error codes.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Rejected {
                status_code,
                error_code,
                message,
                ..
            } => {
                let status =
                    status_code.map_or_else(|| String::from("unknown"), |code| code.to_string());
                format!(
                    "Detailed Message: {message}\nStatus Code: {status}\nError Code: {error_code}"
                )
            }
            other => other.to_string(),
        }
    }
}
