//! Prompt template registry.
//!
//! Templates are fixed instruction texts that get prepended to free-form user
//! input. The registry is built once and never mutated.

use serde::Serialize;

use crate::observe::{default_hook, PromptLogInfo, SharedHook};
use crate::prompts::system::BASE_PROMPT;
use crate::prompts::tokens::TokenInfo;

/// Estimate JSON schema and formatting rules.
pub const SCHEMA_PROMPT: &str = include_str!("../templates/schema.md");

/// Promotion and discount rule set.
pub const DISCOUNT_PROMPT: &str = include_str!("../templates/discount.md");

/// Separator between template content and user input.
pub const USER_INPUT_SEPARATOR: &str = "\n\n사용자 입력: ";

/// Id of the general estimation template.
pub const DEFAULT_TEMPLATE_ID: &str = "default";

/// Id of the promotion template.
pub const DISCOUNT_TEMPLATE_ID: &str = "discount";

/// A named instruction text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptTemplate {
    /// Unique template id.
    pub id: String,
    /// Human readable title.
    pub title: String,
    /// Instruction text.
    pub content: String,
    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PromptTemplate {
    /// Creates a template.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        description: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            description: description.map(String::from),
        }
    }
}

/// Joins template content and user input.
#[must_use]
pub fn compose(template: &PromptTemplate, user_input: &str) -> String {
    format!("{}{USER_INPUT_SEPARATOR}{user_input}", template.content)
}

/// Ordered set of templates plus the hook notified on every combine.
pub struct TemplateRegistry {
    templates: Vec<PromptTemplate>,
    hook: SharedHook,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

impl TemplateRegistry {
    /// Creates a registry from explicit templates.
    #[must_use]
    pub fn new(templates: Vec<PromptTemplate>) -> Self {
        Self {
            templates,
            hook: default_hook(),
        }
    }

    /// Returns the built-in `default` and `discount` templates.
    #[must_use]
    pub fn builtin() -> Self {
        let default_content = format!("{}\n\n{}", BASE_PROMPT.trim_end(), SCHEMA_PROMPT.trim_end());

        Self::new(vec![
            PromptTemplate::new(
                DEFAULT_TEMPLATE_ID,
                "기본 견적 프롬프트",
                default_content,
                Some("IT 컨설턴트 페르소나와 견적서 JSON 스키마 규칙"),
            ),
            PromptTemplate::new(
                DISCOUNT_TEMPLATE_ID,
                "할인 및 프로모션 프롬프트",
                DISCOUNT_PROMPT.trim_end(),
                Some("기간 연장 할인, 예산 절감, 기능 제안 규칙"),
            ),
        ])
    }

    /// Replaces the observability hook.
    #[must_use]
    pub fn with_hook(mut self, hook: SharedHook) -> Self {
        self.hook = hook;
        self
    }

    /// Looks up a template by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Returns all templates in registration order.
    #[must_use]
    pub fn list(&self) -> &[PromptTemplate] {
        &self.templates
    }

    /// Prepends the template's content to `user_input`.
    ///
    /// Unknown ids return the input unchanged and emit nothing.
    pub fn combine(&self, template_id: &str, user_input: &str) -> String {
        let Some(template) = self.get(template_id) else {
            return user_input.to_string();
        };

        let combined = compose(template, user_input);
        self.hook.prompt_combined(&PromptLogInfo {
            template_id: template.id.clone(),
            user_input: user_input.to_string(),
            token_info: TokenInfo::for_prompt(&combined),
            combined_prompt: combined.clone(),
        });
        combined
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
