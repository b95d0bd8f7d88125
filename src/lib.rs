//! Core library for the Stackpilot stack provisioning tool.
//!
//! The crate drives CloudFormation-style stacks around a build step: it
//! decides between create and update, polls until the provider reaches a
//! terminal state, publishes stack outputs as environment variables for
//! later steps, and tears stacks down in reverse order once the job ends.
//! The provider is reached through the [`RemoteStackClient`] trait; the
//! shipped implementation shells out to the `aws` CLI.

pub mod client;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod env;
pub mod job;
pub mod lifecycle;
pub mod log;
pub mod naming;
pub mod params;
pub mod publish;
pub mod stack;
pub mod test_support;
pub mod workspace;

pub use client::{AwsCliClient, ClientError, DEFAULT_AWS_BIN, RemoteStackClient, StackRequest};
pub use command::{
    CommandError, CommandOutput, CommandRunner, ProcessCommandRunner, StreamingCommandRunner,
};
pub use config::{AwsConfig, ConfigError, Credentials};
pub use coordinator::{
    CoordinatorRun, MultiStackCoordinator, RunReport, StackOutcome, StackRecord, TeardownSummary,
};
pub use env::Environment;
pub use job::{JobError, JobFile, StackConfig};
pub use lifecycle::{
    CancelSignal, CancelTrigger, DeleteTarget, Interrupted, StackLifecycle, cancel_pair,
};
pub use log::{LogSink, SharedSink, WriterSink};
pub use params::{Parameter, ParameterError, ParameterMap};
pub use publish::{EnvFilePublisher, OutputPublisher, PublishError};
pub use stack::{
    Backoff, Capability, OutputSet, PollPolicy, Region, StackError, StackHandle, StackSpec,
    StackSpecBuilder, StackStatus, TemplateSource,
};
pub use workspace::{DirWorkspace, WorkspaceError, WorkspaceReader};
