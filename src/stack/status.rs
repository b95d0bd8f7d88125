//! Provider stack status classification.

use std::fmt;

/// Lifecycle status reported by the provider for a stack.
///
/// Only [`StackStatus::CreateComplete`] and [`StackStatus::UpdateComplete`]
/// count as a successful terminal state. A stack that no longer appears in a
/// describe response is treated as an implicit [`StackStatus::DeleteComplete`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum StackStatus {
    /// `CREATE_IN_PROGRESS`.
    CreateInProgress,
    /// `UPDATE_IN_PROGRESS`.
    UpdateInProgress,
    /// `CREATE_COMPLETE`.
    CreateComplete,
    /// `UPDATE_COMPLETE`.
    UpdateComplete,
    /// `CREATE_FAILED`.
    CreateFailed,
    /// `DELETE_IN_PROGRESS`.
    DeleteInProgress,
    /// `DELETE_COMPLETE`.
    DeleteComplete,
    /// `DELETE_FAILED`.
    DeleteFailed,
    /// `ROLLBACK_COMPLETE`.
    RollbackComplete,
    /// Any status string the model does not name, kept verbatim.
    Unknown(String),
}

impl StackStatus {
    /// Parses a provider status string. Unrecognised values become
    /// [`StackStatus::Unknown`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "CREATE_FAILED" => Self::CreateFailed,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Returns the provider spelling of the status.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Returns `true` for the successful terminal states.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::CreateComplete | Self::UpdateComplete)
    }

    /// Returns `true` while the provider is still working on the stack.
    ///
    /// Unrecognised statuses ending in `_IN_PROGRESS` (rollbacks, cleanup
    /// phases) are treated as non-terminal so the poll loop keeps waiting.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        match self {
            Self::CreateInProgress | Self::UpdateInProgress | Self::DeleteInProgress => true,
            Self::Unknown(raw) => raw.ends_with("_IN_PROGRESS"),
            _ => false,
        }
    }

    /// Returns `true` when no further automatic transition is expected.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    /// Returns `true` for the statuses prefix selection considers "running".
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(
            self,
            Self::UpdateComplete | Self::CreateComplete | Self::RollbackComplete
        )
    }

    /// Status filter used when listing running stacks.
    #[must_use]
    pub const fn running_filter() -> [Self; 3] {
        [
            Self::UpdateComplete,
            Self::CreateComplete,
            Self::RollbackComplete,
        ]
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for StackStatus {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for StackStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}
