use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while asking the model for a plan
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Model request failed: {0}")]
    RequestFailed(String),

    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model API returned {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Model returned no usable text")]
    EmptyResponse,

    #[error("Model response could not be decoded: {0}")]
    InvalidResponse(String),
}

/// Errors raised while setting up a model client
#[derive(Error, Debug)]
pub enum ModelSetupError {
    #[error("No API key configured. Set GEMINI_API_KEY or add api_key to the config file")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// A generative model that turns a prompt into response text
#[async_trait]
pub trait PlanModel: Send + Sync {
    /// Human-readable name of the model (e.g., "gemini-1.5-flash")
    fn name(&self) -> &str;

    /// Send the prompt and return the model's text response
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
