//! # taskpilot-plan
//!
//! Plan data model for taskpilot: the task and feedback values, the host
//! platform profile, prompt construction, and parsing of model output.
//!
//! ## Key Types
//!
//! - [`Plan`] - Steps, commands and files produced by one generation round
//! - [`PlanPrompts`] - Builds the plan request for the model
//! - [`PlatformProfile`] - Host OS family used to pick a command dialect

mod plan;
mod platform;
mod prompts;
mod task;

pub use plan::{FileSpec, MalformedPlanError, Plan};
pub use platform::{PlatformFamily, PlatformProfile};
pub use prompts::PlanPrompts;
pub use task::{EmptyTaskError, Feedback, Task};
