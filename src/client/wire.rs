//! JSON shapes printed by `aws cloudformation ... --output json`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::params::Parameter;
use crate::stack::{StackDescription, StackEvent, StackOutput, StackStatus, StackSummary};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct StackIdResponse {
    pub(super) stack_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DescribeStacksResponse {
    #[serde(default)]
    pub(super) stacks: Vec<WireStack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct WireStack {
    stack_id: String,
    stack_name: String,
    stack_status: String,
    #[serde(default)]
    stack_status_reason: Option<String>,
    #[serde(default)]
    creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    outputs: Vec<WireOutput>,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireOutput {
    output_key: String,
    #[serde(default)]
    output_value: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DescribeEventsResponse {
    #[serde(default)]
    pub(super) stack_events: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct WireEvent {
    event_id: String,
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    resource_status: String,
    #[serde(default)]
    resource_status_reason: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ListStacksResponse {
    #[serde(default)]
    pub(super) stack_summaries: Vec<WireSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct WireSummary {
    stack_name: String,
    stack_status: String,
    creation_time: DateTime<Utc>,
}

impl From<WireStack> for StackDescription {
    fn from(value: WireStack) -> Self {
        Self {
            name: value.stack_name,
            id: value.stack_id,
            status: StackStatus::from(value.stack_status),
            status_reason: value.stack_status_reason,
            creation_time: value.creation_time,
            outputs: value
                .outputs
                .into_iter()
                .map(|output| StackOutput {
                    key: output.output_key,
                    value: output.output_value,
                    description: output.description,
                })
                .collect(),
            parameters: value.parameters,
        }
    }
}

impl From<WireEvent> for StackEvent {
    fn from(value: WireEvent) -> Self {
        Self {
            id: value.event_id,
            resource_type: value.resource_type,
            status: value.resource_status,
            reason: value.resource_status_reason,
            timestamp: value.timestamp,
        }
    }
}

impl From<WireSummary> for StackSummary {
    fn from(value: WireSummary) -> Self {
        Self {
            name: value.stack_name,
            status: StackStatus::from(value.stack_status),
            creation_time: value.creation_time,
        }
    }
}
