//! Token estimation for mixed Korean/English prompts.
//!
//! A lightweight heuristic, not a tokenizer. Its only contract is that the
//! estimate is non-negative and never shrinks when text is appended; it is
//! used for cost logging, never for request gating.

/// Approximate tokens per whitespace-separated word.
const TOKENS_PER_WORD: f64 = 1.3;

/// Approximate tokens per Hangul character (syllable or jamo).
const TOKENS_PER_HANGUL_CHAR: f64 = 2.5;

/// Assumed completion size relative to the prompt when logging a combined
/// prompt before any reply exists.
const COMPLETION_RATIO: f64 = 1.5;

/// Logging tariff in KRW per prompt token.
const PROMPT_TOKEN_COST_KRW: f64 = 0.001;

/// Logging tariff in KRW per completion token.
const COMPLETION_TOKEN_COST_KRW: f64 = 0.002;

/// Returns true for Hangul compatibility jamo (ㄱ..ㅣ) and Hangul syllables.
fn is_hangul(ch: char) -> bool {
    matches!(ch, '\u{3131}'..='\u{3163}' | '\u{AC00}'..='\u{D7A3}')
}

/// Estimates the token count of a text.
///
/// `ceil(words * 1.3 + hangul_chars * 2.5)`, where words are non-empty
/// whitespace-separated runs. Empty or whitespace-only text yields 0.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let hangul_chars = text.chars().filter(|ch| is_hangul(*ch)).count();

    (words as f64 * TOKENS_PER_WORD + hangul_chars as f64 * TOKENS_PER_HANGUL_CHAR).ceil() as usize
}

/// Estimated prompt/completion sizes attached to a prompt log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// Estimated prompt tokens.
    pub prompt_tokens: usize,
    /// Estimated completion tokens (1.5x the prompt).
    pub completion_tokens: usize,
    /// Sum of both.
    pub total_tokens: usize,
}

impl TokenInfo {
    /// Derives token info for a prompt that has not been answered yet.
    #[must_use]
    pub fn for_prompt(prompt: &str) -> Self {
        let prompt_tokens = estimate_tokens(prompt);
        let completion_tokens = (prompt_tokens as f64 * COMPLETION_RATIO).ceil() as usize;
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Cost of the prompt side in KRW at the flat logging tariff.
    #[must_use]
    pub fn prompt_cost_krw(&self) -> f64 {
        self.prompt_tokens as f64 * PROMPT_TOKEN_COST_KRW
    }

    /// Cost of the completion side in KRW at the flat logging tariff.
    #[must_use]
    pub fn completion_cost_krw(&self) -> f64 {
        self.completion_tokens as f64 * COMPLETION_TOKEN_COST_KRW
    }

    /// Total cost in KRW at the flat logging tariff.
    #[must_use]
    pub fn cost_krw(&self) -> f64 {
        self.prompt_cost_krw() + self.completion_cost_krw()
    }
}
