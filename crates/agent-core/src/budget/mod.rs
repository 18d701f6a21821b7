//! Token accounting for tool outputs.
//!
//! # Key Components
//!
//! - [`counter`]: Token counting via heuristic estimation
//! - [`families`]: Model family registry selecting a counter per model

pub mod counter;
pub mod families;

pub use counter::{
    HeuristicTokenCounter, SharedTokenCounter, TokenCounter, DEFAULT_CHARS_PER_TOKEN,
};
pub use families::{CounterLookup, ModelTokenCounters, KNOWN_MODEL_FAMILIES};
