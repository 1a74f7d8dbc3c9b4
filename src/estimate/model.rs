//! Estimate data model and price arithmetic.
//!
//! The model emits prices as comma-grouped integer strings. They are kept as
//! strings for display and parsed to `u64` whenever arithmetic is needed.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::general::group_digits;

/// Average number of weeks per month used for the month approximation.
const WEEKS_PER_MONTH: f64 = 4.345;

/// Errors raised when a price string is not a grouped integer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The price string was empty.
    #[error("Price is empty")]
    Empty,

    /// The price string contained something other than digits and commas.
    #[error("Invalid price: {0:?}")]
    Invalid(String),

    /// The price does not fit in 64 bits.
    #[error("Price out of range: {0:?}")]
    Overflow(String),
}

/// Parses a price such as `"10,000,000"`, `"₩2,400,000"` or `"500,000원"`.
pub fn parse_price(text: &str) -> Result<u64, PriceError> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix('₩')
        .or_else(|| trimmed.strip_prefix("KRW"))
        .unwrap_or(trimmed)
        .trim();
    let stripped = stripped.strip_suffix('원').unwrap_or(stripped).trim();

    if stripped.is_empty() {
        return Err(PriceError::Empty);
    }
    if !stripped.starts_with(|c: char| c.is_ascii_digit())
        || !stripped.chars().all(|c| c.is_ascii_digit() || c == ',')
    {
        return Err(PriceError::Invalid(text.to_string()));
    }

    stripped
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse::<u64>()
        .map_err(|_| PriceError::Overflow(text.to_string()))
}

/// Formats an amount as a comma-grouped integer string.
#[must_use]
pub fn format_price(amount: u64) -> String {
    group_digits(amount)
}

/// Returns the VAT-included amount at 10 %.
#[must_use]
pub fn vat_included(amount: u64) -> u64 {
    amount.saturating_add(amount / 10)
}

/// Accepts either a string or a JSON number for price-like fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(match n.as_u64() {
            Some(v) => format_price(v),
            None => n.to_string(),
        }),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

/// A structured project estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEstimate {
    /// Project name.
    #[serde(default)]
    pub project_name: String,
    /// Total price, comma-grouped.
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_price: String,
    /// Total price including VAT, comma-grouped.
    #[serde(default, deserialize_with = "lenient_string")]
    pub vat_included_price: String,
    /// Estimated period such as `"22주"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub estimated_period: String,
    /// Feature categories.
    pub categories: Vec<Category>,
}

/// Top-level grouping of estimate items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category name, optionally prefixed with an emoji.
    #[serde(default)]
    pub category_name: String,
    /// Sub-categories.
    #[serde(default)]
    pub sub_categories: Vec<SubCategory>,
}

/// Second-level grouping of estimate items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCategory {
    /// Sub-category name.
    #[serde(default)]
    pub sub_category_name: String,
    /// Line items.
    #[serde(default)]
    pub items: Vec<EstimateItem>,
}

/// One priced line of an estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateItem {
    /// Feature name.
    #[serde(default)]
    pub name: String,
    /// Price, comma-grouped.
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: String,
    /// Scope and pricing basis.
    #[serde(default)]
    pub description: String,
}

/// A line item with the names of its enclosing groups.
#[derive(Debug, Clone, Copy)]
pub struct ItemRef<'a> {
    /// Enclosing category.
    pub category: &'a Category,
    /// Enclosing sub-category.
    pub sub_category: &'a SubCategory,
    /// The item.
    pub item: &'a EstimateItem,
}

/// Stated totals compared with totals re-derived from the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Sum of all item prices.
    pub items_total: u64,
    /// `total_price` as stated, if it parsed.
    pub stated_total: Option<u64>,
    /// `vat_included_price` as stated, if it parsed.
    pub stated_vat_included: Option<u64>,
    /// VAT-included amount derived from the stated total (or the items total
    /// when the stated one is unreadable).
    pub expected_vat_included: u64,
}

impl Reconciliation {
    /// True when the stated total equals the item sum.
    #[must_use]
    pub fn total_matches(&self) -> bool {
        self.stated_total == Some(self.items_total)
    }

    /// True when the stated VAT-included price is 110 % of the total.
    #[must_use]
    pub fn vat_matches(&self) -> bool {
        self.stated_vat_included == Some(self.expected_vat_included)
    }
}

impl ProjectEstimate {
    /// Iterates all items with their enclosing groups, in document order.
    pub fn items(&self) -> impl Iterator<Item = ItemRef<'_>> {
        self.categories.iter().flat_map(|category| {
            category.sub_categories.iter().flat_map(move |sub_category| {
                sub_category.items.iter().map(move |item| ItemRef {
                    category,
                    sub_category,
                    item,
                })
            })
        })
    }

    /// Parses `total_price`.
    pub fn total_amount(&self) -> Result<u64, PriceError> {
        parse_price(&self.total_price)
    }

    /// Sums all item prices. Fails on the first unreadable price.
    pub fn items_sum(&self) -> Result<u64, PriceError> {
        self.items().try_fold(0u64, |sum, r| {
            let price = parse_price(&r.item.price)?;
            sum.checked_add(price)
                .ok_or_else(|| PriceError::Overflow(r.item.price.clone()))
        })
    }

    /// Re-derives totals from the items.
    pub fn reconcile(&self) -> Result<Reconciliation, PriceError> {
        let items_total = self.items_sum()?;
        let stated_total = self.total_amount().ok();
        Ok(Reconciliation {
            items_total,
            stated_total,
            stated_vat_included: parse_price(&self.vat_included_price).ok(),
            expected_vat_included: vat_included(stated_total.unwrap_or(items_total)),
        })
    }

    /// Leading number of `estimated_period` (`"22주"` -> 22).
    #[must_use]
    pub fn period_weeks(&self) -> Option<u32> {
        leading_number(&self.estimated_period)
    }

    /// Months approximated as `ceil(weeks / 4.345)`.
    #[must_use]
    pub fn approx_months(&self) -> Option<u32> {
        self.period_weeks().map(weeks_to_months)
    }
}

/// Converts weeks to whole months, rounding up.
#[must_use]
pub fn weeks_to_months(weeks: u32) -> u32 {
    (f64::from(weeks) / WEEKS_PER_MONTH).ceil() as u32
}

/// Parses the first run of ASCII digits in `text`.
fn leading_number(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
