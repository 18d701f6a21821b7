//! Token counting for tool output classification.
//!
//! Provides heuristic token estimation (chars / ratio + safety margin). Exact
//! provider tokenization is not attempted; the estimate only has to be good
//! enough to decide whether a payload belongs in the context window.

use std::sync::Arc;

/// Characters-per-token ratio used when nothing better is known.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Multiplier applied on top of the raw estimate.
pub const DEFAULT_SAFETY_MARGIN: f64 = 1.1;

/// Trait for token counting implementations.
pub trait TokenCounter: Send + Sync + std::fmt::Debug {
    /// Count tokens in a plain text string.
    fn count_text(&self, text: &str) -> u32;
}

/// Heuristic token counter using character-based estimation.
///
/// Uses the approximation: tokens ≈ characters / ratio, scaled by a safety
/// margin and rounded up. Errs on the side of overestimating.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicTokenCounter {
    /// Characters per token ratio (default: 4)
    chars_per_token: f64,
    /// Safety margin multiplier (default: 1.1 = 10% extra)
    safety_margin: f64,
}

impl HeuristicTokenCounter {
    /// Create a new heuristic counter with custom parameters.
    ///
    /// Non-positive ratios fall back to [`DEFAULT_CHARS_PER_TOKEN`].
    pub fn new(chars_per_token: f64, safety_margin: f64) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            DEFAULT_CHARS_PER_TOKEN
        };
        let safety_margin = if safety_margin.is_finite() && safety_margin > 0.0 {
            safety_margin
        } else {
            1.0
        };

        Self {
            chars_per_token,
            safety_margin,
        }
    }

    /// Create with the default margin and a family-specific ratio.
    pub fn with_ratio(chars_per_token: f64) -> Self {
        Self::new(chars_per_token, DEFAULT_SAFETY_MARGIN)
    }

    /// Create with default parameters (chars/4 + 10% margin).
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN, DEFAULT_SAFETY_MARGIN)
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count() as f64;
        let base_tokens = char_count / self.chars_per_token;
        let adjusted_tokens = base_tokens * self.safety_margin;

        // Saturate instead of wrapping on absurdly large payloads
        adjusted_tokens.ceil().min(u32::MAX as f64) as u32
    }
}

/// Arc-wrapped token counter for easy sharing.
pub type SharedTokenCounter = Arc<dyn TokenCounter>;
