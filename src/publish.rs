//! Publication of stack outputs to later build steps.
//!
//! Outputs are already namespaced as `<stackName>_<outputKey>` by the time
//! they reach a publisher. The running [`Environment`] is the in-process
//! publisher; [`EnvFilePublisher`] writes `KEY=VALUE` lines so a separate
//! process can source them.

use std::borrow::Cow;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use shell_escape::unix::escape;
use thiserror::Error;

use crate::env::Environment;
use crate::stack::OutputSet;

/// Errors raised while publishing outputs.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PublishError {
    /// Raised when the target file cannot be written.
    #[error("failed to write {path}: {message}")]
    Io {
        /// Path that could not be written.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the target path has no file name component.
    #[error("output file path is missing a filename: {path}")]
    MissingFileName {
        /// Offending path.
        path: Utf8PathBuf,
    },
}

/// Receives the namespaced outputs of each successful stack.
pub trait OutputPublisher {
    /// Publishes `outputs`, overriding earlier values with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the outputs cannot be made visible.
    fn publish(&mut self, outputs: &OutputSet) -> Result<(), PublishError>;
}

impl OutputPublisher for Environment {
    fn publish(&mut self, outputs: &OutputSet) -> Result<(), PublishError> {
        self.extend(outputs.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        Ok(())
    }
}

/// Writes published outputs to a dotenv-style file.
///
/// The file is rewritten on every publish with everything published so far,
/// in first-published order.
#[derive(Debug)]
pub struct EnvFilePublisher {
    path: Utf8PathBuf,
    dir: Dir,
    file_name: String,
    published: Environment,
    order: Vec<String>,
}

impl EnvFilePublisher {
    /// Prepares a publisher for `path`, creating its parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the parent directory cannot be created
    /// or opened.
    pub fn create(path: impl AsRef<Utf8Path>) -> Result<Self, PublishError> {
        let target = path.as_ref();
        let file_name = target
            .file_name()
            .ok_or_else(|| PublishError::MissingFileName {
                path: target.to_path_buf(),
            })?
            .to_owned();
        let parent = target
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let io_error = |err: std::io::Error| PublishError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        };
        Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(io_error)?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;

        Ok(Self {
            path: target.to_path_buf(),
            dir,
            file_name,
            published: Environment::new(),
            order: Vec::new(),
        })
    }

    /// Path of the file being written.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn render(&self) -> String {
        self.order
            .iter()
            .filter_map(|key| {
                self.published
                    .get(key)
                    .map(|value| format!("{key}={}\n", escape(Cow::Borrowed(value))))
            })
            .collect()
    }
}

impl OutputPublisher for EnvFilePublisher {
    fn publish(&mut self, outputs: &OutputSet) -> Result<(), PublishError> {
        for (key, value) in outputs {
            if self.published.insert(key.clone(), value.clone()).is_none() {
                self.order.push(key.clone());
            }
        }
        self.dir
            .write(&self.file_name, self.render())
            .map_err(|err| PublishError::Io {
                path: self.path.clone(),
                message: err.to_string(),
            })
    }
}
