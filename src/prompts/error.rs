//! Prompt assembly error handling.

use thiserror::Error;

/// Errors raised while assembling model instructions.
#[derive(Error, Debug)]
pub enum PromptError {
    /// The localization settings could not be serialized to JSON.
    #[error("Failed to serialize user localization settings: {0}")]
    Serialization(#[from] serde_json::Error),
}
