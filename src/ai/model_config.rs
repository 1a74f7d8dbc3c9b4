//! Model pricing configuration.
//!
//! Per-model token prices are loaded from an embedded YAML table so cost
//! logging can be adjusted without touching the transport code.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Result;
use serde::Deserialize;

/// Embedded models.yaml content.
pub const MODELS_YAML: &str = include_str!("../templates/models.yaml");

/// Input rate used when neither the table nor a provider default applies.
const FALLBACK_INPUT_PER_MTOK_USD: f64 = 0.2;

/// Output rate used when neither the table nor a provider default applies.
const FALLBACK_OUTPUT_PER_MTOK_USD: f64 = 0.6;

/// Model specification from YAML configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelSpec {
    /// AI provider name (e.g., "gemini").
    pub provider: String,
    /// Human-readable model name (e.g., "Gemini 2.5 Flash").
    pub model: String,
    /// API identifier used for requests (e.g., "gemini-2.5-flash").
    pub api_identifier: String,
    /// USD per one million input tokens.
    pub input_per_mtok_usd: f64,
    /// USD per one million output tokens.
    pub output_per_mtok_usd: f64,
    /// Performance tier (e.g., "fast", "balanced").
    pub tier: String,
    /// Whether this is a legacy model that may be deprecated.
    #[serde(default)]
    pub legacy: bool,
}

/// Default pricing for unknown models of a provider.
#[derive(Debug, Deserialize)]
pub struct DefaultPricing {
    /// USD per one million input tokens.
    pub input_per_mtok_usd: f64,
    /// USD per one million output tokens.
    pub output_per_mtok_usd: f64,
}

/// Provider-specific configuration.
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    /// Pricing for models missing from the table.
    pub defaults: DefaultPricing,
}

/// Complete model configuration.
#[derive(Debug, Deserialize, Default)]
pub struct ModelConfiguration {
    /// List of all priced models.
    pub models: Vec<ModelSpec>,
    /// Provider-specific configurations.
    pub providers: HashMap<String, ProviderConfig>,
}

/// Input and output token rates for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// USD per one million input tokens.
    pub input_per_mtok_usd: f64,
    /// USD per one million output tokens.
    pub output_per_mtok_usd: f64,
}

/// Model registry for looking up specifications.
pub struct ModelRegistry {
    config: ModelConfiguration,
    by_identifier: HashMap<String, ModelSpec>,
}

impl ModelRegistry {
    /// Loads the model registry from the embedded YAML.
    pub fn load() -> Result<Self> {
        Self::from_yaml(MODELS_YAML)
    }

    /// Builds a registry from YAML text.
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let config: ModelConfiguration = serde_yaml::from_str(yaml_content)?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: ModelConfiguration) -> Self {
        let by_identifier = config
            .models
            .iter()
            .map(|model| (model.api_identifier.clone(), model.clone()))
            .collect();

        Self {
            config,
            by_identifier,
        }
    }

    /// Returns the model specification by API identifier.
    pub fn get_model_spec(&self, api_identifier: &str) -> Option<&ModelSpec> {
        if let Some(spec) = self.by_identifier.get(api_identifier) {
            return Some(spec);
        }

        self.find_model_by_fuzzy_match(api_identifier)
    }

    /// Returns the table pricing for a model, falling back to provider
    /// defaults and then to the built-in fallback rates.
    pub fn get_pricing(&self, api_identifier: &str) -> ModelPricing {
        if let Some(spec) = self.get_model_spec(api_identifier) {
            return ModelPricing {
                input_per_mtok_usd: spec.input_per_mtok_usd,
                output_per_mtok_usd: spec.output_per_mtok_usd,
            };
        }

        if let Some(provider_config) = self
            .infer_provider(api_identifier)
            .and_then(|provider| self.config.providers.get(provider))
        {
            return ModelPricing {
                input_per_mtok_usd: provider_config.defaults.input_per_mtok_usd,
                output_per_mtok_usd: provider_config.defaults.output_per_mtok_usd,
            };
        }

        ModelPricing {
            input_per_mtok_usd: FALLBACK_INPUT_PER_MTOK_USD,
            output_per_mtok_usd: FALLBACK_OUTPUT_PER_MTOK_USD,
        }
    }

    /// Infers the provider from a model identifier.
    fn infer_provider(&self, api_identifier: &str) -> Option<&'static str> {
        if extract_core_model_identifier(api_identifier).starts_with("gemini") {
            Some("gemini")
        } else {
            None
        }
    }

    /// Finds a model for versioned or resource-style identifiers.
    ///
    /// - `models/gemini-2.5-flash` -> `gemini-2.5-flash`
    /// - `gemini-2.5-flash-001` -> `gemini-2.5-flash`
    /// - `gemini-2.5-flash-lite-preview-06-17` -> `gemini-2.5-flash-lite`
    fn find_model_by_fuzzy_match(&self, api_identifier: &str) -> Option<&ModelSpec> {
        let core_identifier = extract_core_model_identifier(api_identifier);

        if let Some(spec) = self.by_identifier.get(core_identifier) {
            return Some(spec);
        }

        // Longest registered identifier that prefixes the core id at a '-' boundary.
        self.by_identifier
            .iter()
            .filter(|(stored_id, _)| {
                core_identifier
                    .strip_prefix(stored_id.as_str())
                    .is_some_and(|rest| rest.starts_with('-'))
            })
            .max_by_key(|(stored_id, _)| stored_id.len())
            .map(|(_, spec)| spec)
    }

    /// Checks if a model is legacy.
    pub fn is_legacy_model(&self, api_identifier: &str) -> bool {
        self.get_model_spec(api_identifier)
            .map(|spec| spec.legacy)
            .unwrap_or(false)
    }

    /// Returns all priced models.
    pub fn get_all_models(&self) -> &[ModelSpec] {
        &self.config.models
    }
}

/// Strips the `models/` resource prefix used by the REST API.
fn extract_core_model_identifier(api_identifier: &str) -> &str {
    api_identifier
        .strip_prefix("models/")
        .unwrap_or(api_identifier)
}

/// Global model registry instance.
static MODEL_REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();

/// Returns the global model registry instance.
///
/// A broken embedded table degrades to an empty registry so cost logging
/// falls back to default rates instead of taking the transport down.
pub fn get_model_registry() -> &'static ModelRegistry {
    MODEL_REGISTRY.get_or_init(|| {
        ModelRegistry::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load model registry, using fallback pricing: {e}");
            ModelRegistry::from_config(ModelConfiguration::default())
        })
    })
}
