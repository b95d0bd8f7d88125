//! Stack model shared by the lifecycle engine, the remote client, and the
//! multi-stack coordinator.
//!
//! A [`StackSpec`] captures everything needed to provision one stack and is
//! immutable once a lifecycle run starts. A [`StackHandle`] records what the
//! provider reported back once the stack reached a successful terminal state.

mod error;
mod spec;
mod status;
mod types;

pub use error::StackError;
pub use spec::{
    Backoff, Capability, DISABLED_TIMEOUT_SENTINEL, MIN_TIMEOUT, PollPolicy, SpecError, StackSpec,
    StackSpecBuilder, TemplateSource,
};
pub use status::StackStatus;
pub use types::{
    DEFAULT_REGION, OutputSet, Region, StackDescription, StackEvent, StackHandle, StackOutput,
    StackSummary,
};

#[cfg(test)]
mod tests;
