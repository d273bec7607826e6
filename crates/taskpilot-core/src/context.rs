use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use taskpilot_exec::{CommandFailure, ToleratedLaunch};
use taskpilot_plan::{Feedback, Plan, Task};

use crate::LoopState;

/// Result of applying one approved plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Every file was written and every command exited with 0
    Succeeded {
        commands_run: usize,
        #[serde(default)]
        tolerated_missing: Option<ToleratedLaunch>,
    },
    /// A file could not be written; no command ran
    FileWriteFailed {
        index: usize,
        path: PathBuf,
        cause: String,
    },
    /// A command failed; later commands never ran
    CommandFailed(CommandFailure),
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded { .. })
    }

    /// Diagnostic text for the failure, if any
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Succeeded { .. } => None,
            ExecutionOutcome::FileWriteFailed { cause, .. } => Some(cause),
            ExecutionOutcome::CommandFailed(failure) => failure.diagnostic(),
        }
    }

    /// The failing file path or command line
    pub fn failed_item(&self) -> Option<String> {
        match self {
            ExecutionOutcome::Succeeded { .. } => None,
            ExecutionOutcome::FileWriteFailed { path, .. } => Some(path.display().to_string()),
            ExecutionOutcome::CommandFailed(failure) => Some(failure.command.clone()),
        }
    }
}

/// Record of a single loop iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration_number: usize,
    /// The plan shown to the user (the placeholder plan if generation failed)
    pub plan: Plan,
    /// Why generation failed, when it did
    pub generation_error: Option<String>,
    pub approved: bool,
    /// `None` when the plan was not approved
    pub execution: Option<ExecutionOutcome>,
    /// The user's verdict, asked only after a successful execution
    pub judged_success: Option<bool>,
    /// Feedback carried into the next iteration
    pub feedback: Option<Feedback>,
    pub timestamp: DateTime<Utc>,
}

impl IterationRecord {
    fn new(iteration_number: usize, plan: Plan, generation_error: Option<String>) -> Self {
        Self {
            iteration_number,
            plan,
            generation_error,
            approved: false,
            execution: None,
            judged_success: None,
            feedback: None,
            timestamp: Utc::now(),
        }
    }
}

/// State owned by the controller for one task session
#[derive(Debug)]
pub struct SessionContext {
    /// The task, fixed for the session
    pub task: Task,
    /// Working directory
    pub working_dir: PathBuf,
    /// Current iteration number (0-indexed)
    pub iteration: usize,
    /// Current loop state
    state: LoopState,
    /// Most recent feedback; replaced, never accumulated
    feedback: Option<Feedback>,
    /// Record being built for the current iteration
    current: Option<IterationRecord>,
    /// History of all finished iterations
    pub history: Vec<IterationRecord>,
    /// When the session started
    started_at: Instant,
}

impl SessionContext {
    pub fn new(task: Task, working_dir: PathBuf) -> Self {
        Self {
            task,
            working_dir,
            iteration: 0,
            state: LoopState::AwaitingTask,
            feedback: None,
            current: None,
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Move to `next`, returning the previous state
    pub(crate) fn set_state(&mut self, next: LoopState) -> LoopState {
        std::mem::replace(&mut self.state, next)
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    /// Replace the live feedback. Blank text clears it.
    pub fn set_feedback(&mut self, feedback: Feedback) {
        let feedback = (!feedback.as_str().trim().is_empty()).then_some(feedback);
        if let Some(ref mut record) = self.current {
            record.feedback = feedback.clone();
        }
        self.feedback = feedback;
    }

    /// Start the record for the plan produced in this iteration
    pub(crate) fn begin_record(&mut self, plan: Plan, generation_error: Option<String>) {
        self.current = Some(IterationRecord::new(self.iteration, plan, generation_error));
    }

    /// The plan of the current iteration
    pub fn current_plan(&self) -> Option<&Plan> {
        self.current.as_ref().map(|r| &r.plan)
    }

    pub(crate) fn record_mut(&mut self) -> Option<&mut IterationRecord> {
        self.current.as_mut()
    }

    /// Move the current record into history and advance the iteration
    pub(crate) fn finish_iteration(&mut self) {
        if let Some(record) = self.current.take() {
            self.history.push(record);
        }
        self.iteration += 1;
    }

    /// Number of iterations that produced a plan
    pub fn iterations_started(&self) -> usize {
        self.history.len() + usize::from(self.current.is_some())
    }

    /// Close the session, returning its history
    pub(crate) fn into_history(mut self) -> Vec<IterationRecord> {
        if let Some(record) = self.current.take() {
            self.history.push(record);
        }
        self.history
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionContext {
        SessionContext::new(Task::new("list files").unwrap(), PathBuf::from("."))
    }

    #[test]
    fn test_feedback_replaces_previous_value() {
        let mut ctx = context();
        ctx.set_feedback(Feedback::new("first"));
        ctx.set_feedback(Feedback::new("second"));
        assert_eq!(ctx.feedback().map(Feedback::as_str), Some("second"));
    }

    #[test]
    fn test_blank_feedback_clears_previous_value() {
        let mut ctx = context();
        ctx.set_feedback(Feedback::new("first"));
        ctx.set_feedback(Feedback::new("   "));
        assert!(ctx.feedback().is_none());
    }

    #[test]
    fn test_records_move_into_history() {
        let mut ctx = context();
        ctx.begin_record(Plan::generation_failed(), Some("boom".into()));
        assert_eq!(ctx.iterations_started(), 1);
        ctx.set_feedback(Feedback::new("try again"));
        ctx.finish_iteration();

        ctx.begin_record(Plan::default(), None);
        let history = ctx.into_history();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].iteration_number, 0);
        assert_eq!(history[0].generation_error.as_deref(), Some("boom"));
        assert_eq!(
            history[0].feedback.as_ref().map(Feedback::as_str),
            Some("try again")
        );
        assert_eq!(history[1].iteration_number, 1);
    }

    #[test]
    fn test_execution_outcome_details() {
        let outcome = ExecutionOutcome::FileWriteFailed {
            index: 0,
            path: PathBuf::from("out/a.txt"),
            cause: "Permission denied".into(),
        };
        assert!(!outcome.success());
        assert_eq!(outcome.diagnostic(), Some("Permission denied"));
        assert_eq!(outcome.failed_item().as_deref(), Some("out/a.txt"));
    }
}
