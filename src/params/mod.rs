//! Stack parameter encoding, merging, and decoding.
//!
//! Parameters reach a stack from two places: a delimited `key=value` string
//! in the job file and an optional JSON parameter file in the workspace. Both
//! decode into ordered lists whose keys are unique, and [`merge`] combines
//! them with the second source winning on collisions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::Environment;

/// Single stack parameter in the shape the provider expects.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter name.
    #[serde(
        rename(serialize = "ParameterKey", deserialize = "key"),
        alias = "ParameterKey"
    )]
    pub key: String,
    /// Parameter value; absent when reusing the previous value.
    #[serde(
        rename(serialize = "ParameterValue", deserialize = "value"),
        alias = "ParameterValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    /// Keep the value the stack was last deployed with.
    #[serde(
        rename(serialize = "UsePreviousValue", deserialize = "usePreviousValue"),
        alias = "UsePreviousValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub use_previous_value: Option<bool>,
}

impl Parameter {
    /// Creates a parameter with an explicit value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            use_previous_value: None,
        }
    }
}

/// Ordered parameter mapping with unique keys.
///
/// Re-inserting a key replaces its value but keeps its original position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParameterMap {
    entries: Vec<(String, String)>,
}

impl ParameterMap {
    /// Creates an empty mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let owned_key = key.into();
        let owned_value = value.into();
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| *existing == owned_key)
        {
            return Some(std::mem::replace(&mut slot.1, owned_value));
        }
        self.entries.push((owned_key, owned_value));
        None
    }

    /// Looks up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Errors raised while decoding parameters.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParameterError {
    /// Raised when a delimited entry lacks a `=` separator.
    #[error("parameter entry '{entry}' is not of the form key=value")]
    MalformedEntry {
        /// Offending entry, trimmed.
        entry: String,
    },
    /// Raised when a delimited entry has an empty key.
    #[error("parameter entry '{entry}' has an empty key")]
    EmptyKey {
        /// Offending entry, trimmed.
        entry: String,
    },
    /// Raised when a JSON parameter document cannot be parsed.
    #[error("invalid parameter JSON: {message}")]
    Json {
        /// Parser error message.
        message: String,
    },
}

/// Encodes a mapping into the provider's parameter list.
///
/// An absent or empty mapping encodes to `None` so callers send no parameter
/// list rather than an empty one.
#[must_use]
pub fn encode(mapping: Option<&ParameterMap>) -> Option<Vec<Parameter>> {
    let map = mapping.filter(|map| !map.is_empty())?;
    Some(
        map.iter()
            .map(|(key, value)| Parameter::new(key, value))
            .collect(),
    )
}

/// Merges two parameter lists by key; `second` overrides `first` and the
/// first-seen order is preserved.
#[must_use]
pub fn merge(first: &[Parameter], second: &[Parameter]) -> Vec<Parameter> {
    let mut merged: Vec<Parameter> = Vec::with_capacity(first.len() + second.len());
    for parameter in first.iter().chain(second) {
        match merged.iter_mut().find(|existing| existing.key == parameter.key) {
            Some(existing) => existing.clone_from(parameter),
            None => merged.push(parameter.clone()),
        }
    }
    merged
}

/// Decodes a `key=value` list separated by `;` (when present) or `,`.
///
/// Keys and values are trimmed and values are expanded against `env`;
/// unresolved references stay verbatim. Blank entries are ignored.
///
/// # Errors
///
/// Returns [`ParameterError::MalformedEntry`] for an entry without `=` and
/// [`ParameterError::EmptyKey`] for an entry such as `=value`.
pub fn decode_delimited(text: &str, env: &Environment) -> Result<ParameterMap, ParameterError> {
    let delimiter = if text.contains(';') { ';' } else { ',' };
    let mut map = ParameterMap::new();
    for entry in text.split(delimiter).map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        let Some((raw_key, raw_value)) = entry.split_once('=') else {
            return Err(ParameterError::MalformedEntry {
                entry: entry.to_owned(),
            });
        };
        let key = raw_key.trim();
        if key.is_empty() {
            return Err(ParameterError::EmptyKey {
                entry: entry.to_owned(),
            });
        }
        map.insert(key, env.expand(raw_value.trim()));
    }
    Ok(map)
}

/// Decodes a JSON array of `{key, value, usePreviousValue}` records.
///
/// # Errors
///
/// Returns [`ParameterError::Json`] when the document is malformed.
pub fn decode_json(text: &str) -> Result<Vec<Parameter>, ParameterError> {
    serde_json::from_str(text).map_err(|err| ParameterError::Json {
        message: err.to_string(),
    })
}
