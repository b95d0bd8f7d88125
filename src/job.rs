//! Job file parsing and per-stack spec construction.
//!
//! A job file lists stacks in provisioning order:
//!
//! ```toml
//! [[stacks]]
//! name = "app-${BUILD_NUMBER}"
//! template = "templates/app.json"
//! parameters = "Env=prod;Version=${VERSION}"
//! fail_cascade = true
//! ```
//!
//! Each [`StackConfig`] is turned into a [`StackSpec`] only when its turn
//! comes, so references to earlier stacks' outputs resolve.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::toml;
use serde::Deserialize;
use thiserror::Error;

use crate::env::Environment;
use crate::lifecycle::DeleteTarget;
use crate::naming;
use crate::params::{self, ParameterError};
use crate::stack::{Capability, PollPolicy, Region, SpecError, StackSpec, TemplateSource};
use crate::workspace::{WorkspaceError, WorkspaceReader};

/// Errors raised while loading a job file or building a stack from it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum JobError {
    /// Raised when the job file cannot be read.
    #[error("failed to read job file {path}: {message}")]
    Read {
        /// Job file path.
        path: Utf8PathBuf,
        /// Operating system error message.
        message: String,
    },
    /// Raised when the job file is not valid TOML or has the wrong shape.
    #[error("failed to parse job file: {message}")]
    Parse {
        /// Parser error message.
        message: String,
    },
    /// Raised when the template or parameter file cannot be read.
    #[error("stack '{stack}': {source}")]
    Workspace {
        /// Stack name as configured.
        stack: String,
        /// Underlying read failure.
        #[source]
        source: WorkspaceError,
    },
    /// Raised when parameters cannot be decoded.
    #[error("stack '{stack}': {source}")]
    Parameters {
        /// Stack name as configured.
        stack: String,
        /// Underlying decode failure.
        #[source]
        source: ParameterError,
    },
    /// Raised when the resulting spec is incomplete.
    #[error("stack '{stack}': {source}")]
    Spec {
        /// Stack name as configured.
        stack: String,
        /// Underlying validation failure.
        #[source]
        source: SpecError,
    },
}

const DEFAULT_TIMEOUT_SECS: i64 = 300;

const fn default_timeout_secs() -> i64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_true() -> bool {
    true
}

/// One `[[stacks]]` entry of a job file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct StackConfig {
    /// Stack name; may reference environment variables.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Workspace-relative template path, or an `http(s)://` URL.
    pub template: String,
    /// Inline parameters as `k=v` entries separated by `;` or `,`.
    #[serde(default)]
    pub parameters: Option<String>,
    /// Workspace-relative JSON parameter file.
    #[serde(default)]
    pub parameters_file: Option<String>,
    /// Region override; the configured default region applies otherwise.
    #[serde(default)]
    pub region: Option<String>,
    /// IAM acknowledgement.
    #[serde(default)]
    pub capability: Capability,
    /// Create timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: i64,
    /// Pause after a successful create.
    #[serde(default)]
    pub quiescence_secs: u64,
    /// Delete the stack when the job finishes.
    #[serde(default = "default_true")]
    pub auto_delete: bool,
    /// Skip the remaining stacks if this one fails.
    #[serde(default)]
    pub fail_cascade: bool,
    /// When deleting from the job file, treat `name` as a prefix and delete
    /// the oldest running stack that starts with it.
    #[serde(default)]
    pub select_by_prefix: bool,
}

impl StackConfig {
    /// Builds the spec for this stack against the current environment.
    ///
    /// The template reference is expanded, then read from the workspace
    /// unless it is a URL. Parameters from `parameters_file` are merged with
    /// the inline string, which wins on key collisions. Nothing here talks
    /// to the provider, so malformed input fails before any remote call.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when a file cannot be read, parameters cannot be
    /// decoded, or the resulting spec is incomplete.
    pub fn to_spec(
        &self,
        env: &Environment,
        workspace: &dyn WorkspaceReader,
        default_region: &Region,
    ) -> Result<StackSpec, JobError> {
        let template = self.template_source(env, workspace)?;
        let parameters = self.parameter_list(env, workspace)?;

        StackSpec::builder()
            .name(self.name.as_str())
            .description(self.description.clone())
            .template(template)
            .parameters(parameters)
            .region(self.region_or(default_region))
            .capability(self.capability)
            .poll(PollPolicy::from_seconds(self.timeout_secs))
            .quiescence(Duration::from_secs(self.quiescence_secs))
            .auto_delete(self.auto_delete)
            .fail_cascade(self.fail_cascade)
            .build()
            .map_err(|source| JobError::Spec {
                stack: self.name.clone(),
                source,
            })
    }

    /// Builds the delete target for this stack, expanding its name against
    /// `env`. Templates and parameters are not read.
    #[must_use]
    pub fn delete_target(&self, env: &Environment, default_region: &Region) -> DeleteTarget {
        let name = naming::expand(self.name.trim(), env);
        let region = self.region_or(default_region);
        let target = if self.select_by_prefix {
            DeleteTarget::oldest_with_prefix(name, region)
        } else {
            DeleteTarget::exact(name, region)
        };
        target.with_backoff(PollPolicy::from_seconds(self.timeout_secs).backoff)
    }

    fn region_or(&self, default_region: &Region) -> Region {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty())
            .map_or_else(|| default_region.clone(), Region::from)
    }

    fn template_source(
        &self,
        env: &Environment,
        workspace: &dyn WorkspaceReader,
    ) -> Result<TemplateSource, JobError> {
        let reference = env.expand(self.template.trim());
        if TemplateSource::is_url(&reference) {
            return Ok(TemplateSource::Url(reference));
        }
        workspace
            .read_to_string(&reference)
            .map(TemplateSource::Body)
            .map_err(|source| self.workspace_error(source))
    }

    fn parameter_list(
        &self,
        env: &Environment,
        workspace: &dyn WorkspaceReader,
    ) -> Result<Option<Vec<params::Parameter>>, JobError> {
        let from_file = match self.parameters_file.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => {
                let text = workspace
                    .read_to_string(&env.expand(path))
                    .map_err(|source| self.workspace_error(source))?;
                params::decode_json(&text).map_err(|source| self.parameter_error(source))?
            }
            _ => Vec::new(),
        };
        let inline = match self.parameters.as_deref() {
            Some(text) => {
                let mapping = params::decode_delimited(text, env)
                    .map_err(|source| self.parameter_error(source))?;
                params::encode(Some(&mapping)).unwrap_or_default()
            }
            None => Vec::new(),
        };

        let merged = params::merge(&from_file, &inline);
        Ok((!merged.is_empty()).then_some(merged))
    }

    fn workspace_error(&self, source: WorkspaceError) -> JobError {
        JobError::Workspace {
            stack: self.name.clone(),
            source,
        }
    }

    fn parameter_error(&self, source: ParameterError) -> JobError {
        JobError::Parameters {
            stack: self.name.clone(),
            source,
        }
    }
}

/// Parsed job file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct JobFile {
    /// Stacks in provisioning order.
    #[serde(default)]
    pub stacks: Vec<StackConfig>,
}

impl JobFile {
    /// Parses job file text.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Parse`] when the text is not a valid job file.
    pub fn parse(text: &str) -> Result<Self, JobError> {
        toml::from_str(text).map_err(|err| JobError::Parse {
            message: err.to_string(),
        })
    }

    /// Delete targets for every stack, last stack first.
    #[must_use]
    pub fn delete_targets(&self, env: &Environment, default_region: &Region) -> Vec<DeleteTarget> {
        self.stacks
            .iter()
            .rev()
            .map(|stack| stack.delete_target(env, default_region))
            .collect()
    }

    /// Reads and parses the job file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Read`] when the file cannot be read and
    /// [`JobError::Parse`] when its contents are invalid.
    pub fn load(path: &Utf8Path) -> Result<Self, JobError> {
        let read_error = |message: String| JobError::Read {
            path: path.to_path_buf(),
            message,
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| read_error(String::from("path is missing a filename")))?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| read_error(err.to_string()))?;
        let text = dir
            .read_to_string(file_name)
            .map_err(|err| read_error(err.to_string()))?;
        Self::parse(&text)
    }
}
