use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Task description cannot be empty")]
pub struct EmptyTaskError;

/// The user's natural-language task, fixed for a whole session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Task(String);

impl Task {
    /// Create a task, rejecting empty or whitespace-only text
    pub fn new(text: impl Into<String>) -> Result<Self, EmptyTaskError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EmptyTaskError);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// User explanation of what went wrong in the previous attempt.
///
/// Carried verbatim into the next prompt. Only the most recent value is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feedback(String);

impl Feedback {
    /// Feedback recorded when the plan's files could not be written
    pub const FILE_CREATION_FAILED: &'static str = "Failed to create required files";

    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn file_creation_failed() -> Self {
        Self::new(Self::FILE_CREATION_FAILED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
