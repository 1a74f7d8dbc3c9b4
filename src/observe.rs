//! Observability hook for prompt and usage events.
//!
//! Core operations compute their result first and then hand one event to the
//! hook. The default [`TracingHook`] writes structured `tracing` events;
//! [`RecordingHook`] keeps them in memory for inspection.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::ai::usage::{format_krw, format_usd, UsageReport};
use crate::prompts::tokens::TokenInfo;
use crate::utils::general::group_digits;

/// A template was combined with user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLogInfo {
    /// Template id that resolved.
    pub template_id: String,
    /// Raw user input.
    pub user_input: String,
    /// Prompt actually sent to the model.
    pub combined_prompt: String,
    /// Estimated sizes.
    pub token_info: TokenInfo,
}

/// Receives observability events from the core.
pub trait ObservabilityHook: Send + Sync {
    /// Called after a successful template combine.
    fn prompt_combined(&self, info: &PromptLogInfo);

    /// Called after a successful model call.
    fn usage_recorded(&self, report: &UsageReport);
}

/// Shared handle to a hook.
pub type SharedHook = Arc<dyn ObservabilityHook>;

/// Returns the default hook.
#[must_use]
pub fn default_hook() -> SharedHook {
    Arc::new(TracingHook)
}

/// Emits events through `tracing` at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl ObservabilityHook for TracingHook {
    fn prompt_combined(&self, info: &PromptLogInfo) {
        let tokens = info.token_info;
        info!(
            target: "ai_esti::prompt",
            template_id = %info.template_id,
            user_input = %info.user_input,
            prompt_tokens = tokens.prompt_tokens,
            completion_tokens = tokens.completion_tokens,
            total_tokens = tokens.total_tokens,
            "Combined prompt: {} prompt tokens (₩{:.2}), {} completion tokens (₩{:.2}), total ₩{:.2}",
            group_digits(tokens.prompt_tokens as u64),
            tokens.prompt_cost_krw(),
            group_digits(tokens.completion_tokens as u64),
            tokens.completion_cost_krw(),
            tokens.cost_krw(),
        );
        tracing::debug!(
            target: "ai_esti::prompt",
            combined_prompt = %info.combined_prompt,
            "Combined prompt content"
        );
    }

    fn usage_recorded(&self, report: &UsageReport) {
        let usage = report.usage;
        info!(
            target: "ai_esti::usage",
            operation = report.operation,
            model = %report.model,
            estimated = report.estimated,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cached_tokens = usage.cached_tokens,
            thoughts_tokens = usage.thoughts_tokens,
            total_tokens = usage.total_tokens,
            "{} tokens: input {}, output {}, total {}",
            report.operation,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens,
        );
        info!(
            target: "ai_esti::usage",
            operation = report.operation,
            "{} cost(USD): input {}, output {}, total {}",
            report.operation,
            format_usd(report.input_cost_usd),
            format_usd(report.output_cost_usd),
            format_usd(report.total_cost_usd()),
        );
        info!(
            target: "ai_esti::usage",
            operation = report.operation,
            "{} cost(KRW): input {}, output {}, total {} (FX: {} KRW/USD)",
            report.operation,
            format_krw(report.input_cost_usd * report.usd_krw),
            format_krw(report.output_cost_usd * report.usd_krw),
            format_krw(report.total_cost_krw()),
            report.usd_krw,
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingHook {
    prompts: Mutex<Vec<PromptLogInfo>>,
    usage: Mutex<Vec<UsageReport>>,
}

impl RecordingHook {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns recorded prompt events.
    pub fn prompts(&self) -> Vec<PromptLogInfo> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns recorded usage reports.
    pub fn usage(&self) -> Vec<UsageReport> {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ObservabilityHook for RecordingHook {
    fn prompt_combined(&self, info: &PromptLogInfo) {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(info.clone());
    }

    fn usage_recorded(&self, report: &UsageReport) {
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report.clone());
    }
}
