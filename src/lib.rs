//! # ai-esti
//!
//! A chat-driven AI consultant that turns a project idea into a structured
//! cost and time estimate.
//!
//! The pipeline builds a system instruction ([`prompts`]), talks to a hosted
//! Gemini model ([`ai`]), extracts and validates the estimate embedded in the
//! reply ([`estimate`]) and keeps the conversation and the active estimate
//! ([`store`]). Token usage and cost are reported through an
//! [`observe::ObservabilityHook`].
//!
//! ## Quick Start
//!
//! ```rust
//! use ai_esti::estimate::extract_estimate;
//!
//! let reply = r#"견적입니다.
//! <script type="application/json" id="invoiceData">
//! {"project_name": "데모", "total_price": "1,000", "vat_included_price": "1,100",
//!  "estimated_period": "4주", "categories": []}
//! </script>"#;
//!
//! let estimate = extract_estimate(reply).unwrap();
//! assert_eq!(estimate.project_name, "데모");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ai;
pub mod cli;
pub mod estimate;
pub mod observe;
pub mod prompts;
pub mod store;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of ai-esti.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
