//! Provider configuration loaded via `ortho-config`.

use std::fmt;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::stack::Region;

/// AWS settings derived from environment variables, configuration files,
/// and CLI flags.
///
/// Field names map onto the standard `AWS_*` variables, so an environment
/// already prepared for the `aws` CLI needs no extra setup.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "AWS")]
pub struct AwsConfig {
    /// Access key id. When unset the CLI's own credential chain applies.
    pub access_key_id: Option<String>,
    /// Secret access key paired with `access_key_id`.
    pub secret_access_key: Option<String>,
    /// Region for stacks that do not name one. Defaults to `us-east-1`.
    #[ortho_config(default = "us-east-1".to_owned())]
    pub default_region: String,
    /// Path or name of the `aws` binary.
    #[ortho_config(default = "aws".to_owned())]
    pub cli_bin: String,
}

/// Access and secret key pair passed through to the provider client.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to the configuration file",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const ACCESS_KEY: FieldMetadata =
    FieldMetadata::new("AWS access key id", "AWS_ACCESS_KEY_ID", "access_key_id");
const SECRET_KEY: FieldMetadata = FieldMetadata::new(
    "AWS secret access key",
    "AWS_SECRET_ACCESS_KEY",
    "secret_access_key",
);
const REGION: FieldMetadata =
    FieldMetadata::new("default region", "AWS_DEFAULT_REGION", "default_region");
const CLI_BIN: FieldMetadata = FieldMetadata::new("aws CLI binary", "AWS_CLI_BIN", "cli_bin");

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|trimmed| !trimmed.is_empty())
}

impl AwsConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("stackpilot")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Credentials must be supplied as a pair
    /// or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the variable to set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_region.trim().is_empty() {
            return Err(REGION.missing());
        }
        if self.cli_bin.trim().is_empty() {
            return Err(CLI_BIN.missing());
        }
        match (
            non_blank(self.access_key_id.as_ref()),
            non_blank(self.secret_access_key.as_ref()),
        ) {
            (Some(_), None) => Err(SECRET_KEY.missing()),
            (None, Some(_)) => Err(ACCESS_KEY.missing()),
            _ => Ok(()),
        }
    }

    /// Returns the explicit credential pair, if both halves are set.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        let access = non_blank(self.access_key_id.as_ref())?;
        let secret = non_blank(self.secret_access_key.as_ref())?;
        Some(Credentials {
            access_key_id: access.to_owned(),
            secret_access_key: secret.to_owned(),
        })
    }

    /// Default region as a [`Region`].
    #[must_use]
    pub fn region(&self) -> Region {
        Region::from(self.default_region.trim())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
