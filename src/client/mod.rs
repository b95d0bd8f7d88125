//! Capability interface over the remote stack provisioning API.
//!
//! The lifecycle engine only needs six calls. Each returns a boxed future so
//! the trait stays object safe and test doubles can script responses
//! without a runtime of their own.

use std::future::Future;
use std::pin::Pin;

mod aws_cli;
mod error;
mod wire;

pub use aws_cli::{AwsCliClient, DEFAULT_AWS_BIN};
pub use error::ClientError;

use crate::params::Parameter;
use crate::stack::{
    Capability, Region, StackDescription, StackEvent, StackSpec, StackStatus, StackSummary,
    TemplateSource,
};

/// Future returned by [`RemoteStackClient`] operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Create or update request for one stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackRequest {
    /// Expanded stack name.
    pub name: String,
    /// Target region.
    pub region: Region,
    /// Template body or URL.
    pub template: TemplateSource,
    /// Parameters; `None` omits the parameter list entirely.
    pub parameters: Option<Vec<Parameter>>,
    /// IAM acknowledgement.
    pub capability: Capability,
}

impl StackRequest {
    /// Builds a request for `spec` under its expanded `name`.
    #[must_use]
    pub fn from_spec(spec: &StackSpec, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: spec.region.clone(),
            template: spec.template.clone(),
            parameters: spec.parameters.clone(),
            capability: spec.capability,
        }
    }
}

/// Calls the lifecycle engine makes against the provider.
pub trait RemoteStackClient: Send + Sync {
    /// Starts creating a stack and returns its provider identifier.
    fn create_stack<'a>(&'a self, request: &'a StackRequest) -> ClientFuture<'a, String>;

    /// Starts updating a stack and returns its provider identifier.
    ///
    /// Returns [`ClientError::NoUpdates`] when nothing would change.
    fn update_stack<'a>(&'a self, request: &'a StackRequest) -> ClientFuture<'a, String>;

    /// Describes one stack by name, or every stack when `name` is `None`.
    ///
    /// Describing a missing stack by name returns [`ClientError::NotFound`].
    fn describe_stacks<'a>(
        &'a self,
        region: &'a Region,
        name: Option<&'a str>,
    ) -> ClientFuture<'a, Vec<StackDescription>>;

    /// Starts deleting a stack.
    fn delete_stack<'a>(&'a self, region: &'a Region, name: &'a str) -> ClientFuture<'a, ()>;

    /// Returns the stack's event history, newest first.
    fn describe_stack_events<'a>(
        &'a self,
        region: &'a Region,
        name: &'a str,
    ) -> ClientFuture<'a, Vec<StackEvent>>;

    /// Lists stacks whose status is in `filter`.
    fn list_stacks<'a>(
        &'a self,
        region: &'a Region,
        filter: &'a [StackStatus],
    ) -> ClientFuture<'a, Vec<StackSummary>>;
}
