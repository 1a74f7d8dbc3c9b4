//! Generative-AI backend trait, shared request types and HTTP helpers.

pub mod error;
pub mod gemini;
pub mod model_config;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod transport;
pub mod usage;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::ai::error::AiError;
use crate::ai::usage::TokenUsage;

pub use gemini::GeminiBackend;
pub use transport::{ChatTransport, HealthCheck};

/// HTTP request timeout for model API calls.
///
/// Long estimate replies with large JSON blocks can take well over a minute
/// on the flash models; five minutes still prevents indefinite hangs.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Author of a conversation turn as the model API sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnRole {
    /// Text written by the person chatting.
    User,
    /// Text produced by the model.
    Model,
}

impl TurnRole {
    /// Returns the wire name used by the generateContent API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Model => "model",
        }
    }
}

/// One message of a conversation sent to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    /// Who wrote the turn.
    pub role: TurnRole,
    /// Plain text of the turn.
    pub text: String,
}

impl Turn {
    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    /// Creates a model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A complete, self-contained request to a generative backend.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier (e.g. `gemini-2.5-flash-lite`).
    pub model: String,
    /// System instruction applied to the whole conversation.
    pub system_instruction: Option<String>,
    /// Conversation turns, oldest first. The last turn is the new message.
    pub turns: Vec<Turn>,
}

/// Text produced by the backend plus whatever usage it reported.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    /// Raw model text.
    pub text: String,
    /// Token usage reported by the service, if any.
    pub usage: Option<TokenUsage>,
}

/// Metadata about a backend implementation.
#[derive(Clone, Debug)]
pub struct BackendMetadata {
    /// Service provider name.
    pub provider: String,
    /// Base URL requests are sent to.
    pub base_url: String,
}

/// Trait for generative-AI service backends.
///
/// Implementations are stateless: every call carries the full
/// [`GenerationRequest`]. Session state lives in
/// [`ChatTransport`](transport::ChatTransport).
pub trait GenerativeBackend: Send + Sync {
    /// Sends a request to the AI service and returns the raw generation.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Generation>> + Send + 'a>>;

    /// Returns metadata about the backend implementation.
    fn get_metadata(&self) -> BackendMetadata;
}

// ── Shared helpers for backend implementations ──────────────────────

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Checks an HTTP response for error status and returns a structured error
/// if non-success.
///
/// On failure, reads the error body and returns an
/// [`AiError::ApiRequestFailed`].
pub(crate) async fn check_error_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(AiError::ApiRequestFailed(format!("HTTP {status}: {error_text}")).into())
}

/// Logs successful text extraction from a model API response.
pub(crate) fn log_response_success(provider: &str, result: &Result<Generation>) {
    if let Ok(generation) = result {
        tracing::debug!(
            response_len = generation.text.len(),
            usage = ?generation.usage,
            "Successfully extracted text content from {} API response",
            provider
        );
        tracing::debug!(
            response_content = %generation.text,
            "{} API response content",
            provider
        );
    }
}
