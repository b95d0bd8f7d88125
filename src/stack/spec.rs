//! Stack specification and the poll policy it carries.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::params::Parameter;

use super::Region;

/// Shortest timeout a configured stack may use.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout value that disables both the timeout check and all poll delays.
///
/// Intended for driving the lifecycle against test doubles.
pub const DISABLED_TIMEOUT_SENTINEL: i64 = -12_345;

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_millis(300_000);

/// Delay strategy applied between poll attempts and throttled calls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// Retry without waiting.
    Immediate,
    /// Wait `min(2^attempt × base, cap)`.
    Exponential {
        /// Delay multiplied by `2^attempt`.
        base: Duration,
        /// Upper bound on any single delay.
        cap: Duration,
    },
}

impl Backoff {
    /// Returns the delay before retry number `attempt` (starting at 1).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Immediate => Duration::ZERO,
            Self::Exponential { base, cap } => 2_u32
                .checked_pow(attempt)
                .and_then(|factor| base.checked_mul(factor))
                .map_or(cap, |wait| wait.min(cap)),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: BACKOFF_BASE,
            cap: BACKOFF_CAP,
        }
    }
}

/// Timeout and backoff used while waiting on the provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Wall-clock budget for create; `None` never times out.
    pub timeout: Option<Duration>,
    /// Delay strategy between attempts.
    pub backoff: Backoff,
}

impl PollPolicy {
    /// Builds a policy from a configured number of seconds.
    ///
    /// Values below [`MIN_TIMEOUT`] are raised to it.
    /// [`DISABLED_TIMEOUT_SENTINEL`] yields [`PollPolicy::disabled`].
    #[must_use]
    pub fn from_seconds(seconds: i64) -> Self {
        if seconds == DISABLED_TIMEOUT_SENTINEL {
            return Self::disabled();
        }
        let requested = Duration::from_secs(u64::try_from(seconds).unwrap_or_default());
        Self {
            timeout: Some(requested.max(MIN_TIMEOUT)),
            backoff: Backoff::default(),
        }
    }

    /// No timeout and no delay between attempts.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            timeout: None,
            backoff: Backoff::Immediate,
        }
    }

    /// Uses an exact timeout with the default backoff, bypassing the
    /// [`MIN_TIMEOUT`] floor.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            backoff: Backoff::default(),
        }
    }

    /// Configured timeout in whole seconds, zero when disabled.
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.map_or(0, |timeout| timeout.as_secs())
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(MIN_TIMEOUT),
            backoff: Backoff::default(),
        }
    }
}

/// IAM acknowledgement passed with create and update calls.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// `CAPABILITY_IAM`: the template may create unnamed IAM resources.
    #[default]
    #[serde(alias = "CAPABILITY_IAM")]
    Iam,
    /// `CAPABILITY_NAMED_IAM`: the template may create named IAM resources.
    #[serde(alias = "CAPABILITY_NAMED_IAM")]
    NamedIam,
}

impl Capability {
    /// Provider spelling of the capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iam => "CAPABILITY_IAM",
            Self::NamedIam => "CAPABILITY_NAMED_IAM",
        }
    }
}

/// Where the stack template comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TemplateSource {
    /// Inline template document.
    Body(String),
    /// Remote template location.
    Url(String),
}

impl TemplateSource {
    /// Returns `true` when `reference` starts with `http://` or `https://`,
    /// ignoring ASCII case.
    #[must_use]
    pub fn is_url(reference: &str) -> bool {
        ["http://", "https://"].iter().any(|scheme| {
            reference
                .get(..scheme.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
        })
    }
}

/// Errors raised when a [`StackSpec`] cannot be built.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SpecError {
    /// Raised when a required field is empty.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Everything needed to provision one stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackSpec {
    /// Stack name, possibly containing `$NAME` references.
    pub name: String,
    /// Free-form description used in log lines.
    pub description: Option<String>,
    /// Template body or URL.
    pub template: TemplateSource,
    /// Encoded parameters; `None` sends no parameter list at all.
    pub parameters: Option<Vec<Parameter>>,
    /// Target region.
    pub region: Region,
    /// IAM acknowledgement.
    pub capability: Capability,
    /// Timeout and backoff.
    pub poll: PollPolicy,
    /// Pause after a successful create before returning.
    pub quiescence: Duration,
    /// Delete the stack during teardown.
    pub auto_delete: bool,
    /// Skip later stacks when this one fails.
    pub fail_cascade: bool,
}

impl StackSpec {
    /// Starts a builder for a [`StackSpec`].
    #[must_use]
    pub fn builder() -> StackSpecBuilder {
        StackSpecBuilder::new()
    }
}

/// Builder for [`StackSpec`] that trims and validates on construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackSpecBuilder {
    name: String,
    description: Option<String>,
    template: Option<TemplateSource>,
    parameters: Option<Vec<Parameter>>,
    region: Region,
    capability: Capability,
    poll: PollPolicy,
    quiescence: Duration,
    auto_delete: bool,
    fail_cascade: bool,
}

impl Default for StackSpecBuilder {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            template: None,
            parameters: None,
            region: Region::default(),
            capability: Capability::default(),
            poll: PollPolicy::default(),
            quiescence: Duration::ZERO,
            auto_delete: true,
            fail_cascade: false,
        }
    }
}

impl StackSpecBuilder {
    /// Creates a builder with every option defaulted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stack name template.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, value: Option<String>) -> Self {
        self.description = value;
        self
    }

    /// Sets the template source.
    #[must_use]
    pub fn template(mut self, value: TemplateSource) -> Self {
        self.template = Some(value);
        self
    }

    /// Sets the encoded parameter list.
    #[must_use]
    pub fn parameters(mut self, value: Option<Vec<Parameter>>) -> Self {
        self.parameters = value;
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn region(mut self, value: impl Into<Region>) -> Self {
        self.region = value.into();
        self
    }

    /// Sets the capability.
    #[must_use]
    pub const fn capability(mut self, value: Capability) -> Self {
        self.capability = value;
        self
    }

    /// Sets the poll policy.
    #[must_use]
    pub const fn poll(mut self, value: PollPolicy) -> Self {
        self.poll = value;
        self
    }

    /// Sets the post-create quiescence pause.
    #[must_use]
    pub const fn quiescence(mut self, value: Duration) -> Self {
        self.quiescence = value;
        self
    }

    /// Sets whether teardown deletes the stack.
    #[must_use]
    pub const fn auto_delete(mut self, value: bool) -> Self {
        self.auto_delete = value;
        self
    }

    /// Sets whether a failure skips the remaining stacks.
    #[must_use]
    pub const fn fail_cascade(mut self, value: bool) -> Self {
        self.fail_cascade = value;
        self
    }

    /// Builds and validates the [`StackSpec`].
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Validation`] when the name, region, or template
    /// is empty.
    pub fn build(self) -> Result<StackSpec, SpecError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(SpecError::Validation(String::from("name")));
        }
        let region = Region::from(self.region.trim());
        if region.is_empty() {
            return Err(SpecError::Validation(String::from("region")));
        }
        let template = match self.template {
            Some(TemplateSource::Body(body)) if !body.trim().is_empty() => {
                TemplateSource::Body(body)
            }
            Some(TemplateSource::Url(url)) if !url.trim().is_empty() => {
                TemplateSource::Url(url.trim().to_owned())
            }
            _ => return Err(SpecError::Validation(String::from("template"))),
        };
        Ok(StackSpec {
            name,
            description: self
                .description
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            template,
            parameters: self.parameters,
            region,
            capability: self.capability,
            poll: self.poll,
            quiescence: self.quiescence,
            auto_delete: self.auto_delete,
            fail_cascade: self.fail_cascade,
        })
    }
}
