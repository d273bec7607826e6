use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::IterationRecord;

/// Why the user ended the session without success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The user declined a plan
    Declined,
    /// An abort was requested (e.g., Ctrl+C)
    Interrupted,
}

/// The final outcome of a task session
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopOutcome {
    /// The user confirmed the task achieved its goal
    Succeeded {
        iterations: usize,
        #[serde(skip)]
        history: Vec<IterationRecord>,
        total_duration_secs: f64,
    },
    /// The user ended the session
    AbortedByUser {
        iterations: usize,
        reason: AbortReason,
        #[serde(skip)]
        history: Vec<IterationRecord>,
        total_duration_secs: f64,
    },
}

impl LoopOutcome {
    pub fn succeeded(iterations: usize, history: Vec<IterationRecord>, duration: Duration) -> Self {
        Self::Succeeded {
            iterations,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn aborted(
        iterations: usize,
        reason: AbortReason,
        history: Vec<IterationRecord>,
        duration: Duration,
    ) -> Self {
        Self::AbortedByUser {
            iterations,
            reason,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn iterations(&self) -> usize {
        match self {
            Self::Succeeded { iterations, .. } => *iterations,
            Self::AbortedByUser { iterations, .. } => *iterations,
        }
    }

    pub fn history(&self) -> &[IterationRecord] {
        match self {
            Self::Succeeded { history, .. } => history,
            Self::AbortedByUser { history, .. } => history,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::AbortedByUser {
                reason: AbortReason::Declined,
                ..
            } => "declined",
            Self::AbortedByUser {
                reason: AbortReason::Interrupted,
                ..
            } => "interrupted",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Succeeded { .. } => 0,
            Self::AbortedByUser {
                reason: AbortReason::Declined,
                ..
            } => 1,
            Self::AbortedByUser {
                reason: AbortReason::Interrupted,
                ..
            } => 130,
        }
    }
}
