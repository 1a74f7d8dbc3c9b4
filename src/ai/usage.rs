//! Token usage and cost accounting for model calls.
//!
//! Cost figures are observability only. Nothing in the transport gates on
//! them.

use crate::ai::model_config::{get_model_registry, ModelPricing};
use crate::prompts::tokens::estimate_tokens;
use crate::utils::general::group_digits;

/// Default USD to KRW exchange rate used when `USD_KRW` is unset.
pub const DEFAULT_USD_KRW: f64 = 1350.0;

/// Env var overriding the input rate for every model.
pub const INPUT_RATE_ENV: &str = "GEMINI_INPUT_PER_MTOK_USD";

/// Env var overriding the output rate for every model.
pub const OUTPUT_RATE_ENV: &str = "GEMINI_OUTPUT_PER_MTOK_USD";

/// Env var overriding the exchange rate.
pub const USD_KRW_ENV: &str = "USD_KRW";

/// Token counts for a single model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt (system instruction and history included).
    pub prompt_tokens: u64,
    /// Tokens in the generated candidates.
    pub completion_tokens: u64,
    /// Prompt tokens served from cache.
    pub cached_tokens: u64,
    /// Tokens spent on model thinking.
    pub thoughts_tokens: u64,
    /// Total tokens as reported, or prompt + completion.
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Estimates usage from raw text when the service reports none.
    #[must_use]
    pub fn estimated(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = estimate_tokens(prompt) as u64;
        let completion_tokens = estimate_tokens(completion) as u64;
        Self {
            prompt_tokens,
            completion_tokens,
            cached_tokens: 0,
            thoughts_tokens: 0,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Pricing overrides and exchange rate applied to usage reports.
#[derive(Debug, Clone, PartialEq)]
pub struct CostSettings {
    input_override: Option<f64>,
    output_override: Option<f64>,
    usd_krw: f64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            input_override: None,
            output_override: None,
            usd_krw: DEFAULT_USD_KRW,
        }
    }
}

impl CostSettings {
    /// Reads overrides from the environment with settings-file fallback.
    pub fn from_env() -> Self {
        Self::from_lookup(crate::utils::settings::env_lookup())
    }

    /// Reads overrides through an arbitrary key lookup.
    ///
    /// Only positive finite numbers are accepted; anything else is ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            input_override: parse_positive(lookup(INPUT_RATE_ENV)),
            output_override: parse_positive(lookup(OUTPUT_RATE_ENV)),
            usd_krw: parse_positive(lookup(USD_KRW_ENV)).unwrap_or(DEFAULT_USD_KRW),
        }
    }

    /// Returns the effective pricing for a model. Overrides win over the table.
    #[must_use]
    pub fn pricing_for(&self, model: &str) -> ModelPricing {
        let table = get_model_registry().get_pricing(model);
        ModelPricing {
            input_per_mtok_usd: self.input_override.unwrap_or(table.input_per_mtok_usd),
            output_per_mtok_usd: self.output_override.unwrap_or(table.output_per_mtok_usd),
        }
    }

    /// Returns the KRW per USD exchange rate.
    #[must_use]
    pub fn usd_krw(&self) -> f64 {
        self.usd_krw
    }
}

fn parse_positive(value: Option<String>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Usage and derived cost of one completed model call.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    /// Transport operation (`send_turn`, `generate_once`, `test_model`).
    pub operation: &'static str,
    /// Model identifier.
    pub model: String,
    /// Token counts.
    pub usage: TokenUsage,
    /// Whether the counts come from the local estimator.
    pub estimated: bool,
    /// Rates applied.
    pub pricing: ModelPricing,
    /// Exchange rate applied.
    pub usd_krw: f64,
    /// Input cost in USD.
    pub input_cost_usd: f64,
    /// Output cost in USD.
    pub output_cost_usd: f64,
}

impl UsageReport {
    /// Prices a call. Cached and thought tokens are reported but not billed.
    #[must_use]
    pub fn compute(
        operation: &'static str,
        model: &str,
        usage: TokenUsage,
        estimated: bool,
        settings: &CostSettings,
    ) -> Self {
        let pricing = settings.pricing_for(model);
        let input_cost_usd = usage.prompt_tokens as f64 / 1_000_000.0 * pricing.input_per_mtok_usd;
        let output_cost_usd =
            usage.completion_tokens as f64 / 1_000_000.0 * pricing.output_per_mtok_usd;

        Self {
            operation,
            model: model.to_string(),
            usage,
            estimated,
            pricing,
            usd_krw: settings.usd_krw(),
            input_cost_usd,
            output_cost_usd,
        }
    }

    /// Total cost in USD.
    #[must_use]
    pub fn total_cost_usd(&self) -> f64 {
        self.input_cost_usd + self.output_cost_usd
    }

    /// Total cost in KRW.
    #[must_use]
    pub fn total_cost_krw(&self) -> f64 {
        self.total_cost_usd() * self.usd_krw
    }
}

/// Formats a USD amount with four decimals (`$0.0012`).
#[must_use]
pub fn format_usd(value: f64) -> String {
    format!("${value:.4}")
}

/// Formats a KRW amount rounded to whole won with digit grouping (`₩1,350`).
#[must_use]
pub fn format_krw(value: f64) -> String {
    let rounded = value.round();
    if rounded < 0.0 {
        format!("-₩{}", group_digits(rounded.abs() as u64))
    } else {
        format!("₩{}", group_digits(rounded as u64))
    }
}
