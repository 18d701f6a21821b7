//! Deciding whether a tool result is too large for the context window.

use agent_core::budget::{ModelTokenCounters, DEFAULT_CHARS_PER_TOKEN};
use serde::Serialize;

/// Default large-output threshold, in tokens.
pub const DEFAULT_LARGE_OUTPUT_THRESHOLD: u32 = 10_000;

/// Which measurement a classification was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCriterion {
    /// Model-aware token estimate
    Tokens,
    /// Byte length against a token-derived byte budget (no model context)
    Bytes,
}

/// Diagnostics for a single classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputClassification {
    pub byte_len: usize,
    /// `None` when no model was supplied
    pub token_count: Option<u32>,
    /// Family pattern whose counting strategy was used
    pub model_family: Option<String>,
    pub threshold: u32,
    pub criterion: SizeCriterion,
    pub is_large: bool,
}

/// Token-aware large-output classifier.
#[derive(Debug, Clone, Default)]
pub struct OutputClassifier {
    counters: ModelTokenCounters,
}

impl OutputClassifier {
    pub fn new(counters: ModelTokenCounters) -> Self {
        Self { counters }
    }

    pub fn counters(&self) -> &ModelTokenCounters {
        &self.counters
    }

    /// Approximate token count of `payload` for `model_id`.
    pub fn count_tokens(&self, payload: &str, model_id: &str) -> u32 {
        self.counters.count(payload, model_id)
    }

    /// Classify `payload` against `threshold` tokens.
    ///
    /// With a model id the token estimate decides. Without one, the payload
    /// is compared by byte length against `threshold` tokens' worth of bytes.
    pub fn classify(
        &self,
        payload: &str,
        model_id: Option<&str>,
        threshold: u32,
    ) -> OutputClassification {
        let byte_len = payload.len();

        match model_id.map(str::trim).filter(|model| !model.is_empty()) {
            Some(model) => {
                let lookup = self.counters.lookup(model);
                let token_count = lookup.counter.count_text(payload);
                OutputClassification {
                    byte_len,
                    token_count: Some(token_count),
                    model_family: lookup.family,
                    threshold,
                    criterion: SizeCriterion::Tokens,
                    is_large: token_count >= threshold,
                }
            }
            None => OutputClassification {
                byte_len,
                token_count: None,
                model_family: None,
                threshold,
                criterion: SizeCriterion::Bytes,
                is_large: byte_len >= byte_threshold(threshold),
            },
        }
    }

    pub fn is_large(&self, payload: &str, model_id: Option<&str>, threshold: u32) -> bool {
        self.classify(payload, model_id, threshold).is_large
    }
}

/// Byte budget equivalent to `threshold` tokens at the default ratio.
pub fn byte_threshold(threshold: u32) -> usize {
    (threshold as f64 * DEFAULT_CHARS_PER_TOKEN) as usize
}
