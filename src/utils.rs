//! Utility functions and helpers.

pub mod general;
pub mod preflight;
pub mod settings;

// Re-export commonly used items from general
pub use general::*;
pub use preflight::{check_ai_credentials, AiCredentialInfo};
pub use settings::{env_lookup, Settings};
