//! Model family registry for token counting.
//!
//! Maps model identifiers to a counting strategy. New families register a
//! counter here; the classifier only ever asks for "the counter for this
//! model" and never branches on the model itself.

use std::sync::Arc;

use super::counter::{HeuristicTokenCounter, SharedTokenCounter};

/// Built-in model families and their characters-per-token ratios.
pub const KNOWN_MODEL_FAMILIES: &[(&str, f64)] = &[
    // OpenAI o200k-style tokenizers
    ("gpt-4o", 4.0),
    ("gpt-4.1", 4.0),
    ("gpt-5", 4.0),
    ("o1", 4.0),
    ("o3", 4.0),
    ("o4", 4.0),
    // OpenAI cl100k-style tokenizers
    ("gpt-4", 3.8),
    ("gpt-3.5", 3.8),
    // Anthropic
    ("claude", 3.5),
    // Google
    ("gemini", 4.0),
    // Open-weight models
    ("llama", 3.3),
    ("mistral", 3.3),
    ("qwen", 3.3),
    ("deepseek", 3.3),
];

/// Result of resolving a model identifier to a counter.
#[derive(Debug, Clone)]
pub struct CounterLookup {
    pub counter: SharedTokenCounter,
    /// The family pattern that matched, `None` when the default was used.
    pub family: Option<String>,
}

/// Registry of token counters keyed by model family pattern.
///
/// # Matching Strategy
/// 1. The id is lowercased and any provider path (`openai/`) is dropped.
/// 2. A pattern matches when it prefixes the id or follows a `.`
///    (`us.anthropic.claude-3-5-sonnet`).
/// 3. User-registered families win over built-ins; otherwise the longest
///    (most specific) pattern wins.
#[derive(Debug, Clone)]
pub struct ModelTokenCounters {
    user: Vec<(String, SharedTokenCounter)>,
    builtin: Vec<(String, SharedTokenCounter)>,
    default_counter: SharedTokenCounter,
}

impl ModelTokenCounters {
    /// Create a registry with the built-in families.
    pub fn new() -> Self {
        let builtin = KNOWN_MODEL_FAMILIES
            .iter()
            .map(|(pattern, ratio)| {
                (
                    pattern.to_string(),
                    Arc::new(HeuristicTokenCounter::with_ratio(*ratio)) as SharedTokenCounter,
                )
            })
            .collect();

        Self {
            user: Vec::new(),
            builtin,
            default_counter: Arc::new(HeuristicTokenCounter::default()),
        }
    }

    /// Create a registry with no families; every lookup hits the default.
    pub fn empty() -> Self {
        Self {
            user: Vec::new(),
            builtin: Vec::new(),
            default_counter: Arc::new(HeuristicTokenCounter::default()),
        }
    }

    /// Register a counting strategy for a model family.
    ///
    /// Registering the same pattern twice replaces the earlier strategy.
    pub fn register(&mut self, pattern: impl Into<String>, counter: SharedTokenCounter) {
        let pattern = pattern.into().to_ascii_lowercase();
        self.user.retain(|(existing, _)| *existing != pattern);
        self.user.push((pattern, counter));
    }

    pub fn default_counter(&self) -> SharedTokenCounter {
        Arc::clone(&self.default_counter)
    }

    /// Resolve the counter for a model id.
    pub fn lookup(&self, model: &str) -> CounterLookup {
        let normalized = normalize_model_id(model);

        let best = best_match(&self.user, &normalized)
            .or_else(|| best_match(&self.builtin, &normalized));

        match best {
            Some((pattern, counter)) => CounterLookup {
                counter: Arc::clone(counter),
                family: Some(pattern.clone()),
            },
            None => {
                tracing::debug!(
                    "No token counting strategy for model '{}', using default approximation",
                    model
                );
                CounterLookup {
                    counter: self.default_counter(),
                    family: None,
                }
            }
        }
    }

    /// Count tokens in `text` for `model`.
    pub fn count(&self, text: &str, model: &str) -> u32 {
        self.lookup(model).counter.count_text(text)
    }
}

impl Default for ModelTokenCounters {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_model_id(model: &str) -> String {
    let lowered = model.trim().to_ascii_lowercase();
    match lowered.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => lowered,
    }
}

fn matches_family(model: &str, pattern: &str) -> bool {
    model.starts_with(pattern) || model.contains(&format!(".{pattern}"))
}

fn best_match<'a>(
    entries: &'a [(String, SharedTokenCounter)],
    model: &str,
) -> Option<&'a (String, SharedTokenCounter)> {
    entries
        .iter()
        .filter(|(pattern, _)| matches_family(model, pattern))
        .max_by_key(|(pattern, _)| pattern.len())
}
