//! Prompt assembly: token estimation, templates and the system instruction.

pub mod error;
pub mod system;
pub mod templates;
pub mod tokens;

pub use error::PromptError;
pub use system::{build_system_instruction, LocalizationSettings};
pub use templates::{PromptTemplate, TemplateRegistry};
pub use tokens::{estimate_tokens, TokenInfo};
