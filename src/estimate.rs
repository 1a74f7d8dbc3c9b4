//! Estimate data model, reply extraction and promotion rules.

pub mod extract;
pub mod model;
pub mod promotion;

pub use extract::{extract_all_estimates, extract_estimate, parse_estimate, parse_reply, AiReply, ExtractError};
pub use model::{Category, EstimateItem, PriceError, ProjectEstimate, SubCategory};
pub use promotion::{
    apply_extension_discount, interpret_reply, verify_extension_discount, DiscountOutcome,
    DiscountQuote, PromotionMode, QuoteLine,
};
