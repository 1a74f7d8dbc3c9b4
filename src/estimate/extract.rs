//! Locates and validates the estimate block embedded in a model reply.
//!
//! The model wraps the estimate JSON in
//! `<script type="application/json" id="invoiceData">...</script>`. Anything
//! else in the reply is prose for the chat log.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::estimate::model::ProjectEstimate;

/// Opening tag of the estimate block.
pub const ESTIMATE_OPEN_TAG: &str = r#"<script type="application/json" id="invoiceData">"#;

/// Closing tag of the estimate block.
pub const ESTIMATE_CLOSE_TAG: &str = "</script>";

/// Errors raised while reading an estimate block.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// No estimate block in the text.
    #[error("No invoiceData block found in response")]
    MarkerNotFound,

    /// The block payload is not JSON.
    #[error("Estimate block is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The payload is JSON but not an estimate.
    #[error("Estimate block has an unexpected shape: {0}")]
    InvalidShape(String),
}

/// A model reply split into display parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiReply {
    /// Text shown above the estimate card (the whole reply when there is no
    /// estimate).
    pub prose: String,
    /// The estimate, if the reply carried a valid one.
    pub estimate: Option<ProjectEstimate>,
    /// Additional estimates offered as alternatives.
    pub alternatives: Vec<ProjectEstimate>,
    /// Text shown below the estimate card.
    pub trailing: String,
}

impl AiReply {
    /// A reply without any estimate.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            prose: text.into(),
            ..Self::default()
        }
    }
}

/// First-match, dot-all, non-greedy estimate block.
#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static ESTIMATE_BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script type="application/json" id="invoiceData">(.*?)</script>"#).unwrap()
});

/// Validates a JSON payload as a [`ProjectEstimate`].
pub fn parse_estimate_json(payload: &str) -> Result<ProjectEstimate, ExtractError> {
    let value: serde_json::Value = serde_json::from_str(payload.trim())?;

    let Some(object) = value.as_object() else {
        return Err(ExtractError::InvalidShape(
            "top-level value is not an object".to_string(),
        ));
    };
    if !object.get("categories").is_some_and(serde_json::Value::is_array) {
        return Err(ExtractError::InvalidShape(
            "categories is missing or not an array".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|e| ExtractError::InvalidShape(e.to_string()))
}

/// Parses the first estimate block in `text`.
pub fn parse_estimate(text: &str) -> Result<ProjectEstimate, ExtractError> {
    let captures = ESTIMATE_BLOCK_PATTERN
        .captures(text)
        .ok_or(ExtractError::MarkerNotFound)?;
    parse_estimate_json(captures.get(1).map_or("", |m| m.as_str()))
}

/// Returns the first valid estimate in `text`, or `None`.
///
/// Failures are logged and never propagated.
pub fn extract_estimate(text: &str) -> Option<ProjectEstimate> {
    match parse_estimate(text) {
        Ok(estimate) => Some(estimate),
        Err(ExtractError::MarkerNotFound) => {
            debug!("Reply carries no estimate block");
            None
        }
        Err(e) => {
            warn!(error = %e, "Discarding malformed estimate block");
            None
        }
    }
}

/// Returns every valid estimate block in `text`, in order.
///
/// Malformed blocks are logged and skipped.
pub fn extract_all_estimates(text: &str) -> Vec<ProjectEstimate> {
    ESTIMATE_BLOCK_PATTERN
        .captures_iter(text)
        .enumerate()
        .filter_map(|(index, captures)| {
            let payload = captures.get(1).map_or("", |m| m.as_str());
            match parse_estimate_json(payload) {
                Ok(estimate) => Some(estimate),
                Err(e) => {
                    warn!(block = index, error = %e, "Skipping malformed estimate block");
                    None
                }
            }
        })
        .collect()
}

/// Removes every estimate block from `text`.
#[must_use]
pub fn strip_estimate_blocks(text: &str) -> String {
    ESTIMATE_BLOCK_PATTERN.replace_all(text, "").trim().to_string()
}

/// Splits a reply around its first estimate block.
///
/// When the first block is missing or malformed the whole text is prose.
pub fn parse_reply(text: &str) -> AiReply {
    let Some(captures) = ESTIMATE_BLOCK_PATTERN.captures(text) else {
        return AiReply::plain(text);
    };
    let (Some(whole), Some(payload)) = (captures.get(0), captures.get(1)) else {
        return AiReply::plain(text);
    };

    match parse_estimate_json(payload.as_str()) {
        Ok(estimate) => AiReply {
            prose: text[..whole.start()].trim().to_string(),
            estimate: Some(estimate),
            alternatives: Vec::new(),
            trailing: text[whole.end()..].trim().to_string(),
        },
        Err(e) => {
            warn!(error = %e, "Discarding malformed estimate block");
            AiReply::plain(text)
        }
    }
}

/// Wraps an estimate in the block markup the model uses.
pub fn render_estimate_block(estimate: &ProjectEstimate) -> Result<String, ExtractError> {
    let json = serde_json::to_string_pretty(estimate)?;
    Ok(format!("{ESTIMATE_OPEN_TAG}\n{json}\n{ESTIMATE_CLOSE_TAG}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::estimate::model::tests::sample_estimate;

    const VALID_BLOCK: &str = r#"<script type="application/json" id="invoiceData">
{
  "project_name": "쇼핑몰",
  "total_price": "5,000,000",
  "vat_included_price": "5,500,000",
  "estimated_period": "8주",
  "categories": [
    {
      "category_name": "⚙️ 기본 공통",
      "sub_categories": [
        {
          "sub_category_name": "기반",
          "items": [
            {"name": "퍼블리싱", "price": "5,000,000", "description": "반응형"}
          ]
        }
      ]
    }
  ]
}
</script>"#;

    #[test]
    fn missing_marker_is_none() {
        assert!(extract_estimate("그냥 대화입니다.").is_none());
        assert!(matches!(
            parse_estimate("그냥 대화입니다."),
            Err(ExtractError::MarkerNotFound)
        ));
    }

    #[test]
    fn invalid_json_is_none() {
        let text = r#"<script type="application/json" id="invoiceData">{not json}</script>"#;
        assert!(extract_estimate(text).is_none());
        assert!(matches!(
            parse_estimate(text),
            Err(ExtractError::InvalidJson(_))
        ));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let array = r#"<script type="application/json" id="invoiceData">[1, 2]</script>"#;
        assert!(matches!(
            parse_estimate(array),
            Err(ExtractError::InvalidShape(_))
        ));

        let no_categories =
            r#"<script type="application/json" id="invoiceData">{"project_name": "x"}</script>"#;
        assert!(matches!(
            parse_estimate(no_categories),
            Err(ExtractError::InvalidShape(_))
        ));

        let categories_object = r#"<script type="application/json" id="invoiceData">{"categories": {}}</script>"#;
        assert!(extract_estimate(categories_object).is_none());

        let bad_item = r#"<script type="application/json" id="invoiceData">{"categories": [{"sub_categories": [{"items": [{"name": 3}]}]}]}</script>"#;
        assert!(matches!(
            parse_estimate(bad_item),
            Err(ExtractError::InvalidShape(_))
        ));
    }

    #[test]
    fn valid_block_in_prose() {
        let text = format!("견적을 정리했습니다.\n\n{VALID_BLOCK}\n\n추가 문의 주세요.");
        let estimate = extract_estimate(&text).unwrap();
        assert_eq!(estimate.project_name, "쇼핑몰");
        assert_eq!(estimate.categories[0].sub_categories[0].items[0].name, "퍼블리싱");

        let reply = parse_reply(&text);
        assert_eq!(reply.prose, "견적을 정리했습니다.");
        assert_eq!(reply.trailing, "추가 문의 주세요.");
        assert_eq!(reply.estimate, Some(estimate));
    }

    #[test]
    fn first_block_wins() {
        let second = VALID_BLOCK.replace("쇼핑몰", "두번째");
        let text = format!("{VALID_BLOCK}\n{second}");
        assert_eq!(extract_estimate(&text).unwrap().project_name, "쇼핑몰");

        let all = extract_all_estimates(&text);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].project_name, "두번째");
    }

    #[test]
    fn extract_all_skips_malformed_blocks() {
        let broken = r#"<script type="application/json" id="invoiceData">{oops</script>"#;
        let text = format!("A\n{broken}\nB\n{VALID_BLOCK}");
        let all = extract_all_estimates(&text);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].project_name, "쇼핑몰");
    }

    #[test]
    fn malformed_reply_is_plain_text() {
        let text = r#"설명 <script type="application/json" id="invoiceData">{oops</script>"#;
        let reply = parse_reply(text);
        assert_eq!(reply, AiReply::plain(text));
    }

    #[test]
    fn unterminated_block_is_not_found() {
        let text = r#"<script type="application/json" id="invoiceData">{"categories": []}"#;
        assert!(matches!(
            parse_estimate(text),
            Err(ExtractError::MarkerNotFound)
        ));
    }

    #[test]
    fn strip_removes_all_blocks() {
        let text = format!("앞\n{VALID_BLOCK}\n뒤");
        assert_eq!(strip_estimate_blocks(&text), "앞\n\n뒤");
    }

    #[test]
    fn rendered_block_round_trips() {
        let estimate = sample_estimate();
        let text = format!("안내\n{}", render_estimate_block(&estimate).unwrap());
        assert_eq!(extract_estimate(&text), Some(estimate));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_text_never_panics(s in "\\PC{0,200}") {
                let _ = extract_estimate(&s);
                let reply = parse_reply(&s);
                prop_assert!(reply.estimate.is_none() || s.contains(ESTIMATE_OPEN_TAG));
            }

            #[test]
            fn surrounding_prose_does_not_affect_extraction(
                before in "[a-zA-Z가-힣 .,!?\\n]{0,80}",
                after in "[a-zA-Z가-힣 .,!?\\n]{0,80}",
            ) {
                let estimate = sample_estimate();
                let block = render_estimate_block(&estimate).unwrap();
                let text = format!("{before}{block}{after}");
                prop_assert_eq!(extract_estimate(&text), Some(estimate));
            }
        }
    }
}
