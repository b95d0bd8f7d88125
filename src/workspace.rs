//! Capability-scoped access to the job's workspace files.
//!
//! Template bodies and JSON parameter files are read relative to the
//! workspace root. [`DirWorkspace`] opens the root once through `cap-std`,
//! so relative paths cannot escape it.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised while reading workspace files.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WorkspaceError {
    /// Raised when the workspace root cannot be opened.
    #[error("failed to open workspace {path}: {message}")]
    Open {
        /// Workspace root.
        path: Utf8PathBuf,
        /// Operating system error message.
        message: String,
    },
    /// Raised when a file cannot be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Path relative to the workspace root.
        path: String,
        /// Operating system error message.
        message: String,
    },
}

/// Returns the full text of a named workspace file.
pub trait WorkspaceReader {
    /// Reads `path`, relative to the workspace root.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Read`] when the file is missing, unreadable,
    /// or outside the workspace.
    fn read_to_string(&self, path: &str) -> Result<String, WorkspaceError>;
}

/// Workspace rooted at a directory on disk.
#[derive(Debug)]
pub struct DirWorkspace {
    root: Utf8PathBuf,
    dir: Dir,
}

impl DirWorkspace {
    /// Opens the workspace root.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Open`] when the directory cannot be opened.
    pub fn open(root: impl AsRef<Utf8Path>) -> Result<Self, WorkspaceError> {
        let path = root.as_ref();
        let dir = Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| {
            WorkspaceError::Open {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        Ok(Self {
            root: path.to_path_buf(),
            dir,
        })
    }

    /// Workspace root as opened.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl WorkspaceReader for DirWorkspace {
    fn read_to_string(&self, path: &str) -> Result<String, WorkspaceError> {
        self.dir
            .read_to_string(path.trim_start_matches("./"))
            .map_err(|err| WorkspaceError::Read {
                path: path.to_owned(),
                message: err.to_string(),
            })
    }
}
