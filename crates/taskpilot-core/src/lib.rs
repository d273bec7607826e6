//! # taskpilot-core
//!
//! The plan / approve / execute / refine loop.
//!
//! [`TaskLoopController`] asks a [`taskpilot_model::PlanModel`] for a plan,
//! shows it through a [`Presenter`], writes the plan's files and runs its
//! commands on approval, then asks the user whether the task succeeded.
//! Failures feed back into the next prompt until the user confirms success
//! or aborts.

mod context;
mod controller;
mod error;
mod outcome;
mod presenter;
mod state;

pub use context::{ExecutionOutcome, IterationRecord, SessionContext};
pub use controller::{AbortHandle, TaskLoopController};
pub use error::{LoopError, PlanningError, PresenterError};
pub use outcome::{AbortReason, LoopOutcome};
pub use presenter::Presenter;
pub use state::LoopState;
