use async_trait::async_trait;

use crate::PresenterError;
use taskpilot_plan::Plan;

/// The human side of the loop.
///
/// Execution progress is narrated through the `Logger`; the presenter owns
/// plan display and the decisions only the user can make.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Ask for the task description
    async fn request_task(&self) -> Result<String, PresenterError>;

    /// Display the plan's steps, commands and files
    fn show_plan(&self, plan: &Plan);

    /// Ask whether the shown plan may be applied
    async fn request_approval(&self, plan: &Plan) -> Result<bool, PresenterError>;

    /// Ask whether the task achieved its goal
    async fn request_outcome_judgment(&self) -> Result<bool, PresenterError>;

    /// Ask what went wrong, to steer the next plan
    async fn request_feedback(&self) -> Result<String, PresenterError>;
}
