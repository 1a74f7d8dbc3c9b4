//! Google Gemini REST backend.

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{
    build_http_client, check_error_response, log_response_success, BackendMetadata, Generation,
    GenerationRequest, GenerativeBackend, Turn,
};
use crate::ai::error::AiError;
use crate::ai::usage::TokenUsage;

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const PROVIDER: &str = "Gemini";

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
                thought: None,
            }],
            role: role.map(String::from),
        }
    }
}

impl From<&Turn> for Content {
    fn from(turn: &Turn) -> Self {
        Content::text(Some(turn.role.as_str()), &turn.text)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u64>,
    #[serde(default)]
    candidates_token_count: Option<u64>,
    #[serde(default)]
    cached_content_token_count: Option<u64>,
    #[serde(default)]
    thoughts_token_count: Option<u64>,
    #[serde(default)]
    total_token_count: Option<u64>,
}

impl From<UsageMetadata> for TokenUsage {
    fn from(meta: UsageMetadata) -> Self {
        let prompt_tokens = meta.prompt_token_count.unwrap_or(0);
        let completion_tokens = meta.candidates_token_count.unwrap_or(0);
        TokenUsage {
            prompt_tokens,
            completion_tokens,
            cached_tokens: meta.cached_content_token_count.unwrap_or(0),
            thoughts_tokens: meta.thoughts_token_count.unwrap_or(0),
            total_tokens: meta
                .total_token_count
                .unwrap_or(prompt_tokens + completion_tokens),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Concatenates the first candidate's non-thought text parts.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ── Backend ─────────────────────────────────────────────────────────

/// Gemini `generateContent` client.
pub struct GeminiBackend {
    /// HTTP client for API requests.
    client: Client,
    /// API key sent as `x-goog-api-key`.
    api_key: String,
    /// Service root, without trailing slash.
    base_url: String,
}

impl GeminiBackend {
    /// Creates a backend for the given key and service root.
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| AiError::ConfigurationError(format!("Invalid base URL {base_url}: {e}")))?;

        Ok(Self {
            client: build_http_client()?,
            api_key: api_key.into(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

impl GenerativeBackend for GeminiBackend {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Generation>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                model = %request.model,
                turns = request.turns.len(),
                system_instruction_len = request.system_instruction.as_ref().map_or(0, String::len),
                "Preparing Gemini API request"
            );

            let body = GenerateContentRequest {
                contents: request.turns.iter().map(Content::from).collect(),
                system_instruction: request
                    .system_instruction
                    .as_deref()
                    .map(|s| Content::text(None, s)),
            };

            let url = self.endpoint(&request.model);
            info!(url = %url, model = %request.model, "Sending request to Gemini API");

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| AiError::NetworkError(e.to_string()))?;

            let response = check_error_response(response).await?;

            let parsed: GenerateContentResponse = response
                .json()
                .await
                .map_err(|e| AiError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                candidate_count = parsed.candidates.len(),
                finish_reason = ?parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()),
                "Received Gemini API response"
            );

            if let Some(reason) = parsed
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
            {
                return Err(AiError::PromptBlocked(reason).into());
            }

            let result = parsed
                .text()
                .map(|text| Generation {
                    text,
                    usage: parsed.usage_metadata.map(TokenUsage::from),
                })
                .ok_or_else(|| {
                    AiError::InvalidResponseFormat("No text content in response".to_string())
                        .into()
                });

            log_response_success(PROVIDER, &result);
            result
        })
    }

    fn get_metadata(&self) -> BackendMetadata {
        BackendMetadata {
            provider: PROVIDER.to_string(),
            base_url: self.base_url.clone(),
        }
    }
}

/// Builds a backend from resolved credentials.
pub fn backend_from_credentials(
    credentials: &crate::utils::preflight::AiCredentialInfo,
) -> Result<GeminiBackend> {
    GeminiBackend::new(credentials.api_key.clone(), &credentials.base_url)
        .context("Failed to create Gemini backend")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request(turns: Vec<Turn>, system: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            model: "gemini-2.5-flash-lite".to_string(),
            system_instruction: system.map(String::from),
            turns,
        }
    }

    #[test]
    fn invalid_base_url_is_configuration_error() {
        let err = GeminiBackend::new("k", "not a url").err().unwrap();
        assert!(matches!(
            err.downcast_ref::<AiError>(),
            Some(AiError::ConfigurationError(_))
        ));
    }

    #[test]
    fn endpoint_strips_models_prefix_and_trailing_slash() {
        let backend = GeminiBackend::new("k", "http://localhost:1234/").unwrap();
        assert_eq!(
            backend.endpoint("models/gemini-2.5-flash"),
            "http://localhost:1234/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(backend.get_metadata().provider, "Gemini");
    }

    #[test]
    fn response_text_skips_thoughts() {
        let parsed: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Hello "},
                    {"text": "there"}
                ]}
            }]
        }))
        .unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Hello there"));
    }

    #[test]
    fn usage_total_falls_back_to_sum() {
        let usage = TokenUsage::from(UsageMetadata {
            prompt_token_count: Some(10),
            candidates_token_count: Some(5),
            ..UsageMetadata::default()
        });
        assert_eq!(usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn generate_sends_history_and_system_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-lite:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                    {"role": "user", "parts": [{"text": "estimate please"}]}
                ],
                "systemInstruction": {"parts": [{"text": "be a consultant"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Sure"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 12,
                    "candidatesTokenCount": 3,
                    "cachedContentTokenCount": 4,
                    "thoughtsTokenCount": 2,
                    "totalTokenCount": 17
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = GeminiBackend::new("test-key", &server.uri()).unwrap();
        let generation = backend
            .generate(&request(
                vec![Turn::user("hi"), Turn::model("hello"), Turn::user("estimate please")],
                Some("be a consultant"),
            ))
            .await
            .unwrap();

        assert_eq!(generation.text, "Sure");
        assert_eq!(
            generation.usage,
            Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 3,
                cached_tokens: 4,
                thoughts_tokens: 2,
                total_tokens: 17,
            })
        );
    }

    #[tokio::test]
    async fn http_error_maps_to_api_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key invalid"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new("bad", &server.uri()).unwrap();
        let err = backend
            .generate(&request(vec![Turn::user("hi")], None))
            .await
            .unwrap_err();

        match err.downcast_ref::<AiError>() {
            Some(AiError::ApiRequestFailed(msg)) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("API key invalid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_prompt_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new("k", &server.uri()).unwrap();
        let err = backend
            .generate(&request(vec![Turn::user("hi")], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AiError>(),
            Some(AiError::PromptBlocked(reason)) if reason == "SAFETY"
        ));
    }

    #[tokio::test]
    async fn empty_candidates_is_invalid_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let backend = GeminiBackend::new("k", &server.uri()).unwrap();
        let err = backend
            .generate(&request(vec![Turn::user("hi")], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AiError>(),
            Some(AiError::InvalidResponseFormat(_))
        ));
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new("k", &server.uri()).unwrap();
        let err = backend
            .generate(&request(vec![Turn::user("hi")], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AiError>(),
            Some(AiError::InvalidResponseFormat(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let backend = GeminiBackend::new("k", "http://127.0.0.1:9").unwrap();
        let err = backend
            .generate(&request(vec![Turn::user("hi")], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AiError>(),
            Some(AiError::NetworkError(_))
        ));
    }
}
