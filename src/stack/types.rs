//! Values exchanged with the provider and handed back to callers.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Deref;

use chrono::{DateTime, Utc};

use crate::params::Parameter;

use super::StackStatus;

/// Region used when neither the job nor the environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, PartialEq)]
        pub struct $name(String);

        impl $name {
            /// Wraps the given value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the inner value.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

newtype!(
    /// Provider region a stack lives in (for example `eu-west-1`).
    Region
);

impl Default for Region {
    fn default() -> Self {
        Self::from(DEFAULT_REGION)
    }
}

/// Single output declared by a stack template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackOutput {
    /// Output key as declared in the template.
    pub key: String,
    /// Resolved output value.
    pub value: String,
    /// Optional description from the template.
    pub description: Option<String>,
}

/// Provider view of a stack returned by describe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackDescription {
    /// Stack name.
    pub name: String,
    /// Provider identifier (an ARN for CloudFormation).
    pub id: String,
    /// Current status.
    pub status: StackStatus,
    /// Provider explanation for the current status, if any.
    pub status_reason: Option<String>,
    /// When the stack was first created.
    pub creation_time: Option<DateTime<Utc>>,
    /// Outputs, populated once the stack completes.
    pub outputs: Vec<StackOutput>,
    /// Parameters the stack was last deployed with.
    pub parameters: Vec<Parameter>,
}

/// One entry of a stack's event history.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackEvent {
    /// Event identifier.
    pub id: String,
    /// Resource type the event refers to (for example `AWS::S3::Bucket`).
    pub resource_type: String,
    /// Resource status at the time of the event.
    pub status: String,
    /// Provider explanation, if any.
    pub reason: Option<String>,
    /// When the event was recorded.
    pub timestamp: Option<DateTime<Utc>>,
}

impl StackEvent {
    /// Renders the event as an operator log line.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{} - {} - {} - {}",
            self.id,
            self.resource_type,
            self.status,
            self.reason.as_deref().unwrap_or_default()
        )
    }
}

/// Name and age of a stack returned by list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackSummary {
    /// Stack name.
    pub name: String,
    /// Current status.
    pub status: StackStatus,
    /// When the stack was created.
    pub creation_time: DateTime<Utc>,
}

/// Stack outputs keyed by `<stackName>_<outputKey>`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OutputSet(BTreeMap<String, String>);

impl OutputSet {
    /// Builds the namespaced output map for a stack.
    #[must_use]
    pub fn from_outputs(stack_name: &str, outputs: &[StackOutput]) -> Self {
        Self(
            outputs
                .iter()
                .map(|output| {
                    (
                        format!("{stack_name}_{}", output.key),
                        output.value.clone(),
                    )
                })
                .collect(),
        )
    }

    /// Looks up a namespaced output.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the stack produced no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates outputs in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a OutputSet {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<(String, String)> for OutputSet {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

/// Record of a stack that reached a successful terminal state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackHandle {
    /// Expanded stack name.
    pub name: String,
    /// Provider identifier.
    pub id: String,
    /// Region the stack lives in.
    pub region: Region,
    /// Last status observed by the poll loop.
    pub status: StackStatus,
    /// Namespaced outputs.
    pub outputs: OutputSet,
    /// When the create or update call was accepted.
    pub created_at: DateTime<Utc>,
    /// When deletion was confirmed, if it has been.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StackHandle {
    /// Records a confirmed deletion.
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.status = StackStatus::DeleteComplete;
        self.deleted_at = Some(at);
    }

    /// Returns `true` once deletion has been confirmed.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
