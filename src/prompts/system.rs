//! System instruction assembly.
//!
//! The instruction is the fixed consultant persona followed by the runtime
//! localization block and the data block. The model's rules refer to the
//! `<USER_LOCALIZATION_SETTINGS>` and `<DATA>` tag names, so both are emitted
//! verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::prompts::error::PromptError;

/// Consultant persona and operating rules.
pub const BASE_PROMPT: &str = include_str!("../templates/base_prompt.md");

/// Opening tag of the localization block.
pub const LOCALIZATION_OPEN_TAG: &str = "<USER_LOCALIZATION_SETTINGS>";

/// Closing tag of the localization block.
pub const LOCALIZATION_CLOSE_TAG: &str = "</USER_LOCALIZATION_SETTINGS>";

/// Opening tag of the data block.
pub const DATA_OPEN_TAG: &str = "<DATA>";

/// Closing tag of the data block.
pub const DATA_CLOSE_TAG: &str = "</DATA>";

/// Per-user localization injected into the system instruction.
///
/// Keys stay snake_case because the persona text names them that way.
/// Unknown keys are carried in `extra` and flattened into the same object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizationSettings {
    /// ISO language code for replies and estimate text (e.g. `ko`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_language_code: Option<String>,
    /// ISO currency code for displayed amounts (e.g. `KRW`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_currency_code: Option<String>,
    /// Display name of the user's country.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_country_name: Option<String>,
    /// Exchange rates keyed by currency code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rates: Option<BTreeMap<String, f64>>,
    /// Extension fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LocalizationSettings {
    /// Korean defaults used by the chat UI.
    #[must_use]
    pub fn korea() -> Self {
        Self {
            primary_language_code: Some("ko".to_string()),
            primary_currency_code: Some("KRW".to_string()),
            user_country_name: Some("South Korea".to_string()),
            ..Self::default()
        }
    }
}

/// Builds the full system instruction.
///
/// Order is fixed: base prompt, localization block (only when
/// `user_localization` is given), data block (`<DATA></DATA>` when absent).
/// Serialization failures are returned instead of emitting broken markup.
pub fn build_system_instruction<L>(
    user_localization: Option<&L>,
    data_block: Option<&str>,
) -> Result<String, PromptError>
where
    L: Serialize + ?Sized,
{
    let mut sections = vec![BASE_PROMPT.trim_end().to_string()];

    if let Some(localization) = user_localization {
        let json = serde_json::to_string(localization)?;
        sections.push(format!("{LOCALIZATION_OPEN_TAG}{json}{LOCALIZATION_CLOSE_TAG}"));
    }

    sections.push(format!(
        "{DATA_OPEN_TAG}{}{DATA_CLOSE_TAG}",
        data_block.unwrap_or_default()
    ));

    Ok(sections.join("\n"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde::ser::Error as _;
    use serde::Serializer;

    use super::*;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not representable"))
        }
    }

    #[test]
    fn without_localization_has_empty_data_and_no_localization_tag() {
        let instruction = build_system_instruction::<LocalizationSettings>(None, None).unwrap();
        assert!(instruction.contains("<DATA></DATA>"));
        assert!(!instruction.contains(LOCALIZATION_OPEN_TAG.trim_end_matches('>')));
        assert!(instruction.starts_with(BASE_PROMPT.trim_end()));
    }

    #[test]
    fn localization_block_is_compact_json() {
        let value = serde_json::json!({ "a": 1 });
        let instruction = build_system_instruction(Some(&value), None).unwrap();
        assert!(instruction
            .contains("<USER_LOCALIZATION_SETTINGS>{\"a\":1}</USER_LOCALIZATION_SETTINGS>"));
    }

    #[test]
    fn sections_are_ordered() {
        let instruction =
            build_system_instruction(Some(&LocalizationSettings::korea()), Some("단가표")).unwrap();

        let base = instruction.find("AI 핵심 역할").unwrap();
        let localization = instruction.find("<USER_LOCALIZATION_SETTINGS>{").unwrap();
        let data = instruction.find("<DATA>단가표</DATA>").unwrap();
        assert!(base < localization);
        assert!(localization < data);
        assert!(instruction.ends_with("<DATA>단가표</DATA>"));
    }

    #[test]
    fn typed_settings_serialize_with_snake_case_and_extras() {
        let mut settings = LocalizationSettings::korea();
        settings.exchange_rates = Some(BTreeMap::from([("USD".to_string(), 1350.0)]));
        settings
            .extra
            .insert("timezone".to_string(), serde_json::json!("Asia/Seoul"));

        let instruction = build_system_instruction(Some(&settings), Some("")).unwrap();
        assert!(instruction.contains(
            "<USER_LOCALIZATION_SETTINGS>{\"primary_language_code\":\"ko\",\
             \"primary_currency_code\":\"KRW\",\"user_country_name\":\"South Korea\",\
             \"exchange_rates\":{\"USD\":1350.0},\"timezone\":\"Asia/Seoul\"}\
             </USER_LOCALIZATION_SETTINGS>"
        ));
        assert!(instruction.contains("<DATA></DATA>"));
    }

    #[test]
    fn empty_settings_still_emit_block() {
        let instruction =
            build_system_instruction(Some(&LocalizationSettings::default()), None).unwrap();
        assert!(instruction.contains("<USER_LOCALIZATION_SETTINGS>{}</USER_LOCALIZATION_SETTINGS>"));
    }

    #[test]
    fn serialization_failure_is_an_error() {
        let err = build_system_instruction(Some(&Unserializable), None).unwrap_err();
        assert!(matches!(err, PromptError::Serialization(_)));
        assert!(err.to_string().contains("not representable"));
    }
}
