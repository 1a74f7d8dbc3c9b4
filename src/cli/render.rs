//! Plain-text rendering of estimates and chat messages.

use std::fmt::Write as _;

use crate::estimate::model::{format_price, weeks_to_months, ProjectEstimate};
use crate::estimate::promotion::DiscountOutcome;
use crate::store::conversation::{ChatMessage, MessageRole};

/// Renders an estimate as a text card.
///
/// `period_override` replaces the estimate's own week count when the user
/// adjusted it.
#[must_use]
pub fn render_estimate(estimate: &ProjectEstimate, period_override: Option<u32>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "━━ {} ━━", estimate.project_name);
    let _ = writeln!(
        out,
        "Total: KRW {} (VAT incl. KRW {})",
        estimate.total_price, estimate.vat_included_price
    );

    match period_override.or_else(|| estimate.period_weeks()) {
        Some(weeks) => {
            let _ = writeln!(
                out,
                "Period: {weeks} weeks (about {} months)",
                weeks_to_months(weeks)
            );
        }
        None => {
            let _ = writeln!(out, "Period: {}", estimate.estimated_period);
        }
    }

    for category in &estimate.categories {
        let _ = writeln!(out, "\n[{}]", category.category_name);
        for sub in &category.sub_categories {
            let _ = writeln!(out, "  {}", sub.sub_category_name);
            for item in &sub.items {
                let _ = writeln!(out, "    - {}: {}", item.name, item.price);
                if !item.description.is_empty() {
                    let _ = writeln!(out, "      {}", item.description);
                }
            }
        }
    }

    match estimate.reconcile() {
        Ok(rec) => {
            if !rec.total_matches() {
                let _ = writeln!(
                    out,
                    "\n! Items add up to {}, stated total is {}",
                    format_price(rec.items_total),
                    estimate.total_price
                );
            }
            if !rec.vat_matches() {
                let _ = writeln!(
                    out,
                    "! VAT-included price should be {}",
                    format_price(rec.expected_vat_included)
                );
            }
        }
        Err(e) => {
            let _ = writeln!(out, "\n! Cannot verify totals: {e}");
        }
    }

    out.trim_end().to_string()
}

/// Renders the arithmetic of an applied extension discount.
#[must_use]
pub fn render_discount(outcome: &DiscountOutcome) -> String {
    format!(
        "Non-discountable: {}\nDiscount base: {}\nDiscount (20%): {}\nNew total: {}\nNew duration: {} days",
        format_price(outcome.non_discountable_sum),
        format_price(outcome.discount_base),
        format_price(outcome.discount_amount),
        format_price(outcome.new_total),
        outcome.new_duration_days,
    )
}

/// Renders one conversation log entry.
#[must_use]
pub fn render_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        MessageRole::User => "you",
        MessageRole::Ai => "ai",
    };
    if message.is_loading() {
        format!("{speaker}> (waiting for reply)")
    } else {
        format!("{speaker}> {}", message.content)
    }
}
