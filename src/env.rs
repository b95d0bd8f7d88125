//! Environment mapping used for name and parameter expansion.
//!
//! The mapping starts from the job's environment and grows as stacks publish
//! their outputs, so later stacks can reference values produced earlier in
//! the same run.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal and is covered by unit tests"
)]
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable reference pattern should compile")
});

/// Ordered string-to-string environment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    /// Captures the current process environment, skipping entries that are
    /// not valid UTF-8.
    #[must_use]
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    /// Sets a variable, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(key.into(), value.into())
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` when no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Borrows the underlying map, for handing to a child process.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Substitutes `$NAME` and `${NAME}` references.
    ///
    /// References to unset variables are left verbatim.
    #[must_use]
    pub fn expand(&self, text: &str) -> String {
        REFERENCE
            .replace_all(text, |caps: &Captures<'_>| {
                let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
                match name.and_then(|key| self.get(key)) {
                    Some(value) => value.to_owned(),
                    None => caps
                        .get(0)
                        .map(|whole| whole.as_str().to_owned())
                        .unwrap_or_default(),
                }
            })
            .into_owned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Environment {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        self.vars.extend(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
    }
}
