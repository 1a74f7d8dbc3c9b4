//! Discount and promotion rules.
//!
//! The model applies these rules itself from the `discount` template. The
//! host re-derives the same arithmetic so a returned estimate can be checked
//! and so the CLI can apply the promotion offline.

use thiserror::Error;
use tracing::{debug, warn};

use crate::estimate::extract::{
    extract_all_estimates, parse_reply, strip_estimate_blocks, AiReply, ESTIMATE_OPEN_TAG,
};
use crate::estimate::model::{format_price, parse_price, vat_included, PriceError, ProjectEstimate};

/// Feature names that never receive the extension discount.
pub const NON_DISCOUNTABLE_KEYWORDS: &[&str] = &[
    "페이지",
    "화면",
    "화면설계",
    "웹 기획",
    "앱 기획",
    "디자인",
    "UI/UX",
    "UI 디자인",
    "UX 설계",
    "퍼블리싱",
    "스타일링",
    "로고",
];

/// Weeks added by the extension promotion.
pub const EXTENSION_WEEKS: u32 = 8;

/// Working days per week.
pub const WORKING_DAYS_PER_WEEK: u32 = 5;

/// Days added by the extension promotion.
pub const EXTENSION_DAYS: u32 = EXTENSION_WEEKS * WORKING_DAYS_PER_WEEK;

/// Discount rate of the extension promotion, in percent.
pub const EXTENSION_DISCOUNT_PERCENT: u64 = 20;

/// What the user asked for on a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionMode {
    /// Regular estimation conversation.
    #[default]
    Estimate,
    /// Extend the period by eight weeks for a 20 % discount.
    ExtendDiscount,
    /// Propose two or three reduced-scope alternatives.
    BudgetReduction,
    /// Suggest strategic features without an estimate.
    FeatureSuggestion,
}

impl PromotionMode {
    /// Template the turn is combined with.
    #[must_use]
    pub fn template_id(self) -> &'static str {
        match self {
            PromotionMode::Estimate => crate::prompts::templates::DEFAULT_TEMPLATE_ID,
            _ => crate::prompts::templates::DISCOUNT_TEMPLATE_ID,
        }
    }

    /// Option label the rule set keys on, or `None` for plain estimation.
    #[must_use]
    pub fn option_label(self) -> Option<&'static str> {
        match self {
            PromotionMode::Estimate => None,
            PromotionMode::ExtendDiscount => {
                Some("[프로모션] 개발 기간을 여유 있게! 8주 연장 시 20% 할인 혜택 제공")
            }
            PromotionMode::BudgetReduction => {
                Some("[예산절감] 필수 기능만 남기고, 예산을 스마트하게 줄여보세요")
            }
            PromotionMode::FeatureSuggestion => {
                Some("[AI 제안] AI 심층 분석을 통해 필요기능을 제안 받아보세요")
            }
        }
    }

    /// Builds the user input for a promotion turn.
    ///
    /// Promotion modes carry the previous estimate as `original_estimate`.
    /// Plain estimation passes `user_text` through.
    pub fn request_text(
        self,
        user_text: &str,
        original: Option<&ProjectEstimate>,
    ) -> Result<String, serde_json::Error> {
        let Some(label) = self.option_label() else {
            return Ok(user_text.to_string());
        };

        let mut text = label.to_string();
        if !user_text.trim().is_empty() {
            text.push('\n');
            text.push_str(user_text.trim());
        }
        if let Some(estimate) = original {
            text.push_str("\n\noriginal_estimate:\n");
            text.push_str(&serde_json::to_string_pretty(estimate)?);
        }
        Ok(text)
    }
}

/// Errors raised when an estimate cannot be turned into a quote.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromotionError {
    /// A price did not parse.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// `estimated_period` has no week count.
    #[error("Estimated period has no week count: {0:?}")]
    MissingPeriod(String),
}

/// One priced line of a quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteLine {
    /// Category path (`category / sub-category`).
    pub category: String,
    /// Feature name.
    pub feature: String,
    /// Price.
    pub amount: u64,
}

/// Flat, numeric view of an estimate used by the discount rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountQuote {
    /// Total amount before discount.
    pub total_amount: u64,
    /// Duration in working days.
    pub duration_days: u32,
    /// Priced lines.
    pub lines: Vec<QuoteLine>,
}

impl DiscountQuote {
    /// Flattens an estimate. Weeks become `weeks * 5` working days.
    pub fn from_estimate(estimate: &ProjectEstimate) -> Result<Self, PromotionError> {
        let weeks = estimate
            .period_weeks()
            .ok_or_else(|| PromotionError::MissingPeriod(estimate.estimated_period.clone()))?;

        let lines = estimate
            .items()
            .map(|r| {
                Ok(QuoteLine {
                    category: format!(
                        "{} / {}",
                        r.category.category_name, r.sub_category.sub_category_name
                    ),
                    feature: r.item.name.clone(),
                    amount: parse_price(&r.item.price)?,
                })
            })
            .collect::<Result<Vec<_>, PriceError>>()?;

        Ok(Self {
            total_amount: estimate.total_amount()?,
            duration_days: weeks.saturating_mul(WORKING_DAYS_PER_WEEK),
            lines,
        })
    }
}

/// Result of the extension discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountOutcome {
    /// Sum of lines excluded from the discount.
    pub non_discountable_sum: u64,
    /// Amount the discount applies to, floored at zero.
    pub discount_base: u64,
    /// Discount granted.
    pub discount_amount: u64,
    /// Total after discount.
    pub new_total: u64,
    /// Duration after extension, in working days.
    pub new_duration_days: u32,
}

/// True when `text` contains a non-discountable keyword, ignoring case.
#[must_use]
pub fn is_non_discountable(text: &str) -> bool {
    let lower = text.to_lowercase();
    NON_DISCOUNTABLE_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(&keyword.to_lowercase()))
}

/// `floor(amount * percent / 100)` without intermediate overflow.
fn percent_of(amount: u64, percent: u64) -> u64 {
    amount / 100 * percent + amount % 100 * percent / 100
}

/// Applies the 8-week extension and 20 % discount.
///
/// Lines whose category or feature names a design/planning keyword are not
/// discounted. A negative base yields no discount.
#[must_use]
pub fn apply_extension_discount(quote: &DiscountQuote) -> DiscountOutcome {
    let non_discountable_sum: u64 = quote
        .lines
        .iter()
        .filter(|line| is_non_discountable(&line.category) || is_non_discountable(&line.feature))
        .fold(0u64, |sum, line| sum.saturating_add(line.amount));

    let discount_base = quote.total_amount.saturating_sub(non_discountable_sum);
    let discount_amount = percent_of(discount_base, EXTENSION_DISCOUNT_PERCENT);

    debug!(
        total = quote.total_amount,
        non_discountable_sum, discount_base, discount_amount, "Applied extension discount"
    );

    DiscountOutcome {
        non_discountable_sum,
        discount_base,
        discount_amount,
        new_total: quote.total_amount.saturating_sub(discount_amount),
        new_duration_days: quote.duration_days.saturating_add(EXTENSION_DAYS),
    }
}

impl ProjectEstimate {
    /// Returns this estimate with the extension promotion applied.
    ///
    /// Only `total_price`, `vat_included_price` and `estimated_period`
    /// change; item prices stay as they were.
    pub fn with_extension_discount(&self) -> Result<(ProjectEstimate, DiscountOutcome), PromotionError> {
        let quote = DiscountQuote::from_estimate(self)?;
        let outcome = apply_extension_discount(&quote);
        let weeks = outcome.new_duration_days / WORKING_DAYS_PER_WEEK;

        let mut discounted = self.clone();
        discounted.total_price = format_price(outcome.new_total);
        discounted.vat_included_price = format_price(vat_included(outcome.new_total));
        discounted.estimated_period = format!("{weeks}주");
        Ok((discounted, outcome))
    }
}

/// Differences between a model-discounted estimate and the host's arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountMismatch {
    /// One of the estimates could not be read.
    #[error("Cannot verify discount: {0}")]
    Unreadable(#[from] PromotionError),

    /// The returned total is not the expected one.
    #[error("Discounted total is {actual}, expected {expected}")]
    Total {
        /// Host-computed total.
        expected: String,
        /// Total in the returned estimate.
        actual: String,
    },

    /// The returned VAT-included price is not 110 % of the expected total.
    #[error("VAT-included price is {actual}, expected {expected}")]
    VatIncluded {
        /// Host-computed VAT-included price.
        expected: String,
        /// VAT-included price in the returned estimate.
        actual: String,
    },

    /// The returned period is not eight weeks longer.
    #[error("Estimated period is {actual}, expected {expected}")]
    Period {
        /// Host-computed period.
        expected: String,
        /// Period in the returned estimate.
        actual: String,
    },
}

/// Checks that `returned` is `original` with the extension promotion applied.
pub fn verify_extension_discount(
    original: &ProjectEstimate,
    returned: &ProjectEstimate,
) -> Result<(), DiscountMismatch> {
    let (expected, _) = original.with_extension_discount()?;

    let actual_total = returned.total_amount().map_err(PromotionError::from)?;
    let expected_total = expected.total_amount().map_err(PromotionError::from)?;
    if actual_total != expected_total {
        return Err(DiscountMismatch::Total {
            expected: expected.total_price,
            actual: returned.total_price.clone(),
        });
    }
    if parse_price(&returned.vat_included_price).ok()
        != parse_price(&expected.vat_included_price).ok()
    {
        return Err(DiscountMismatch::VatIncluded {
            expected: expected.vat_included_price,
            actual: returned.vat_included_price.clone(),
        });
    }
    if returned.period_weeks() != expected.period_weeks() {
        return Err(DiscountMismatch::Period {
            expected: expected.estimated_period,
            actual: returned.estimated_period.clone(),
        });
    }
    Ok(())
}

/// Interprets a reply according to the mode the turn was sent in.
pub fn interpret_reply(mode: PromotionMode, text: &str) -> AiReply {
    match mode {
        PromotionMode::Estimate | PromotionMode::ExtendDiscount => parse_reply(text),
        PromotionMode::BudgetReduction => AiReply {
            prose: strip_estimate_blocks(text),
            estimate: None,
            alternatives: extract_all_estimates(text),
            trailing: String::new(),
        },
        PromotionMode::FeatureSuggestion => {
            if text.contains(ESTIMATE_OPEN_TAG) {
                warn!("Feature suggestion reply carried an estimate block; dropping it");
                AiReply::plain(strip_estimate_blocks(text))
            } else {
                AiReply::plain(text)
            }
        }
    }
}
