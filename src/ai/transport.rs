//! Chat transport: model selection, session lifecycle and usage reporting.

use anyhow::Result;
use tracing::{debug, info, warn};

use super::{Generation, GenerationRequest, GenerativeBackend, Turn};
use crate::ai::error::AiError;
use crate::ai::usage::{CostSettings, TokenUsage, UsageReport};
use crate::observe::{default_hook, SharedHook};
use crate::utils::general::truncate_chars;

/// Prompt sent by [`ChatTransport::test_model`].
pub const HEALTH_CHECK_PROMPT: &str = "ping";

/// Maximum characters of the health check reply kept in the message.
const HEALTH_CHECK_REPLY_CHARS: usize = 160;

/// Outcome of a model health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// Whether the model answered.
    pub ok: bool,
    /// Truncated reply, `"OK"`, or the error message.
    pub message: String,
}

/// Conversation-level wrapper around a [`GenerativeBackend`].
///
/// Holds at most one chat session. The session history lives here and is
/// resent on every turn; callers only ever pass the new message.
pub struct ChatTransport {
    backend: Box<dyn GenerativeBackend>,
    model: String,
    system_instruction: Option<String>,
    session: Option<Vec<Turn>>,
    hook: SharedHook,
    costs: CostSettings,
}

impl ChatTransport {
    /// Creates a transport with no system instruction and no session.
    pub fn new(backend: Box<dyn GenerativeBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            system_instruction: None,
            session: None,
            hook: default_hook(),
            costs: CostSettings::default(),
        }
    }

    /// Replaces the observability hook.
    #[must_use]
    pub fn with_hook(mut self, hook: SharedHook) -> Self {
        self.hook = hook;
        self
    }

    /// Replaces the pricing overrides used for usage reports.
    #[must_use]
    pub fn with_cost_settings(mut self, costs: CostSettings) -> Self {
        self.costs = costs;
        self
    }

    /// Returns the active model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the active system instruction.
    #[must_use]
    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    /// Returns true while a chat session is open.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Returns the turns of the open session, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        self.session.as_deref().unwrap_or_default()
    }

    /// Sets model and system instruction.
    ///
    /// The open session is dropped when either value changes.
    pub fn configure(&mut self, model: impl Into<String>, system_instruction: Option<String>) {
        let model = model.into();
        if model != self.model || system_instruction != self.system_instruction {
            if self.session.is_some() {
                debug!(old_model = %self.model, new_model = %model, "Configuration changed, dropping chat session");
            }
            self.session = None;
        }
        self.model = model;
        self.system_instruction = system_instruction;
    }

    /// Drops the open session. The next turn starts a fresh one.
    pub fn reset_session(&mut self) {
        self.session = None;
    }

    /// Opens a session pre-filled with earlier turns.
    pub fn resume_session(&mut self, turns: Vec<Turn>) {
        self.session = Some(turns);
    }

    /// Sends one user message in the open session and returns the raw reply.
    ///
    /// A session is opened on first use. Both turns are appended only after
    /// the model answered, so a failed call leaves the history untouched.
    pub async fn send_turn(&mut self, message: &str) -> Result<String> {
        self.ensure_model()?;

        let mut turns = self.session.clone().unwrap_or_default();
        turns.push(Turn::user(message));

        let request = GenerationRequest {
            model: self.model.clone(),
            system_instruction: self.system_instruction.clone(),
            turns,
        };

        info!(
            model = %self.model,
            history_turns = request.turns.len() - 1,
            "Sending chat turn"
        );

        let generation = self.backend.generate(&request).await?;
        self.record_usage("send_turn", &request, &generation);

        let mut turns = request.turns;
        turns.push(Turn::model(generation.text.clone()));
        self.session = Some(turns);

        Ok(generation.text)
    }

    /// Sends a stateless single prompt with the current model and instruction.
    pub async fn generate_once(&self, prompt: &str) -> Result<String> {
        self.ensure_model()?;

        let request = GenerationRequest {
            model: self.model.clone(),
            system_instruction: self.system_instruction.clone(),
            turns: vec![Turn::user(prompt)],
        };

        info!(model = %self.model, "Sending one-shot prompt");
        let generation = self.backend.generate(&request).await?;
        self.record_usage("generate_once", &request, &generation);
        Ok(generation.text)
    }

    /// Pings the current model with the current instruction. Never fails;
    /// errors become `ok: false`.
    pub async fn test_model(&self) -> HealthCheck {
        let result = async {
            self.ensure_model()?;
            let request = GenerationRequest {
                model: self.model.clone(),
                system_instruction: self.system_instruction.clone(),
                turns: vec![Turn::user(HEALTH_CHECK_PROMPT)],
            };
            let generation = self.backend.generate(&request).await?;
            self.record_usage("test_model", &request, &generation);
            Ok::<_, anyhow::Error>(generation.text)
        }
        .await;

        match result {
            Ok(text) => {
                let trimmed = text.trim();
                let message = if trimmed.is_empty() {
                    "OK".to_string()
                } else {
                    truncate_chars(trimmed, HEALTH_CHECK_REPLY_CHARS).to_string()
                };
                HealthCheck { ok: true, message }
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Model health check failed");
                HealthCheck {
                    ok: false,
                    message: e.to_string(),
                }
            }
        }
    }

    fn ensure_model(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AiError::ConfigurationError("model name is empty".to_string()).into());
        }
        Ok(())
    }

    fn record_usage(
        &self,
        operation: &'static str,
        request: &GenerationRequest,
        generation: &Generation,
    ) {
        let (usage, estimated) = match generation.usage {
            Some(usage) => (usage, false),
            None => (
                TokenUsage::estimated(&request_text(request), &generation.text),
                true,
            ),
        };
        let report = UsageReport::compute(operation, &self.model, usage, estimated, &self.costs);
        self.hook.usage_recorded(&report);
    }
}

/// Flattens a request into the text the estimator sees.
fn request_text(request: &GenerationRequest) -> String {
    request
        .system_instruction
        .iter()
        .map(String::as_str)
        .chain(request.turns.iter().map(|t| t.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}
