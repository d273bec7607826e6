use thiserror::Error;

use crate::LoopState;

/// Why a generation round produced no usable plan
#[derive(Error, Debug)]
pub enum PlanningError {
    #[error(transparent)]
    Generation(#[from] taskpilot_model::GenerationError),

    #[error(transparent)]
    Malformed(#[from] taskpilot_plan::MalformedPlanError),
}

/// Failures of the presentation layer
#[derive(Error, Debug)]
pub enum PresenterError {
    #[error("Input was interrupted")]
    Interrupted,

    #[error("Input stream closed")]
    Closed,

    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Conditions that end the loop without an outcome
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Presenter error: {0}")]
    PresenterError(#[from] PresenterError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: LoopState, to: LoopState },
}
