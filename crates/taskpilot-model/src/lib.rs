//! # taskpilot-model
//!
//! The generative-model boundary: a [`PlanModel`] takes prompt text and
//! returns response text or a [`GenerationError`]. [`GeminiModel`] is the
//! implementation used by the CLI.

mod gemini;
mod traits;

pub use gemini::{GeminiConfig, GeminiModel, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};
pub use traits::{GenerationError, ModelSetupError, PlanModel};
