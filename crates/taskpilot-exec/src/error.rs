use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A file from the plan could not be written
#[derive(Error, Debug)]
#[error("Failed to write {}: {source}", .path.display())]
pub struct FileWriteError {
    /// Position of the entry in the plan
    pub index: usize,
    /// Resolved path of the failing entry
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The first command of a batch that did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    /// Position of the command in the plan
    pub index: usize,
    pub command: String,
    /// `None` when the process could not be launched or was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stderr, `None` when empty or never produced
    pub stderr: Option<String>,
    /// Set when the command could not be launched at all
    pub launch_error: Option<String>,
}

impl CommandFailure {
    pub fn is_launch_error(&self) -> bool {
        self.launch_error.is_some()
    }

    /// Diagnostic text to show the user: stderr, or the launch error
    pub fn diagnostic(&self) -> Option<&str> {
        self.stderr.as_deref().or(self.launch_error.as_deref())
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command {} `{}` ", self.index + 1, self.command)?;
        match (&self.launch_error, self.exit_code) {
            (Some(error), _) => write!(f, "could not be launched: {}", error),
            (None, Some(code)) => write!(f, "failed with exit code {}", code),
            (None, None) => write!(f, "was terminated without an exit code"),
        }
    }
}

impl std::error::Error for CommandFailure {}
