//! Preflight validation checks for early failure detection.
//!
//! Commands that talk to the model call these checks first so a missing API
//! key fails fast with a clear message instead of an HTTP 403 mid-chat.

use anyhow::Result;

use crate::ai::error::AiError;
use crate::ai::gemini::DEFAULT_BASE_URL;
use crate::ai::model_config::get_model_registry;

/// Model used when neither `--model` nor `GEMINI_MODEL` is set.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Result of AI credential validation.
#[derive(Debug, Clone)]
pub struct AiCredentialInfo {
    /// The model that will be used.
    pub model: String,
    /// API key for the Gemini REST API.
    pub api_key: String,
    /// Base URL of the Gemini REST API.
    pub base_url: String,
}

/// Validates AI credentials are available before processing.
///
/// Model precedence: `model_override`, then `GEMINI_MODEL`, then
/// [`DEFAULT_MODEL`].
pub fn check_ai_credentials(model_override: Option<&str>) -> Result<AiCredentialInfo> {
    resolve_credentials(model_override, crate::utils::settings::env_lookup())
}

/// Resolves credentials through an arbitrary key lookup.
pub fn resolve_credentials<F>(model_override: Option<&str>, lookup: F) -> Result<AiCredentialInfo>
where
    F: Fn(&str) -> Option<String>,
{
    let model = model_override
        .map(String::from)
        .or_else(|| lookup("GEMINI_MODEL"))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let api_key = ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .ok_or(AiError::ApiKeyNotFound)?;

    let base_url = lookup("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    if get_model_registry().is_legacy_model(&model) {
        tracing::warn!(model = %model, "Model is marked legacy and may be retired");
    }

    Ok(AiCredentialInfo {
        model,
        api_key,
        base_url,
    })
}
