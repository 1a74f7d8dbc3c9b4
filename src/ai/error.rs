//! Generative-AI transport error handling.

use thiserror::Error;

/// Errors raised while talking to the hosted generative model.
#[derive(Error, Debug)]
pub enum AiError {
    /// API key not found in environment variables or settings.
    #[error("Gemini API key not found. Set GEMINI_API_KEY or GOOGLE_API_KEY environment variable")]
    ApiKeyNotFound,

    /// Model API request failed with error message.
    #[error("Model API request failed: {0}")]
    ApiRequestFailed(String),

    /// Invalid response format from the model API.
    #[error("Invalid response format from model API: {0}")]
    InvalidResponseFormat(String),

    /// The model refused the prompt.
    #[error("Prompt was blocked by the model: {0}")]
    PromptBlocked(String),

    /// Network connectivity error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid transport configuration (bad base URL, empty model name).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}
