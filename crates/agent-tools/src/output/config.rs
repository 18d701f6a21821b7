//! Configuration for large tool output handling.
//!
//! Layering, lowest to highest priority: built-in defaults, an optional JSON
//! file, `TOOL_OUTPUT_*` environment variables, then explicit setters on
//! the store or handler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_core::budget::{HeuristicTokenCounter, ModelTokenCounters};
use serde::{Deserialize, Serialize};

use super::classifier::DEFAULT_LARGE_OUTPUT_THRESHOLD;
use super::store::validate_session_id;

pub const ENV_OUTPUT_FOLDER: &str = "TOOL_OUTPUT_FOLDER";
pub const ENV_THRESHOLD: &str = "TOOL_OUTPUT_THRESHOLD";
pub const ENV_SESSION: &str = "TOOL_OUTPUT_SESSION";
pub const ENV_VIRTUAL_TOOLS: &str = "TOOL_OUTPUT_VIRTUAL_TOOLS";

/// Default root directory for stored outputs.
pub const DEFAULT_OUTPUT_FOLDER: &str = "tool_output_folder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutputConfig {
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,
    /// Session directory name; a fresh UUID is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Large-output threshold in tokens
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Whether large outputs are detected and offloaded
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the read/search/query virtual tools are advertised
    #[serde(default = "default_true")]
    pub virtual_tools_enabled: bool,
    /// Extra token-counting strategies, checked before the built-ins
    #[serde(default)]
    pub model_families: Vec<ModelFamilyConfig>,
}

/// A user-defined token counting strategy for a model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFamilyConfig {
    /// Model id prefix, e.g. "my-finetune"
    pub pattern: String,
    pub chars_per_token: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_margin: Option<f64>,
}

fn default_output_folder() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FOLDER)
}

fn default_threshold() -> u32 {
    DEFAULT_LARGE_OUTPUT_THRESHOLD
}

fn default_true() -> bool {
    true
}

impl Default for ToolOutputConfig {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            session_id: None,
            threshold: default_threshold(),
            enabled: true,
            virtual_tools_enabled: true,
            model_families: Vec::new(),
        }
    }
}

impl ToolOutputConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a JSON config file, then apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let config: Self = serde_json::from_str(&content).map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
                })?;
                log::info!("Loaded tool output configuration from {:?}", path);
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e),
        };

        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `TOOL_OUTPUT_*` overrides from `lookup`.
    ///
    /// Values that do not parse are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(folder) = lookup(ENV_OUTPUT_FOLDER).filter(|v| !v.trim().is_empty()) {
            self.output_folder = PathBuf::from(folder.trim());
        }

        if let Some(raw) = lookup(ENV_THRESHOLD) {
            match raw.trim().parse::<u32>() {
                Ok(threshold) if threshold > 0 => self.threshold = threshold,
                _ => log::warn!("Ignoring invalid {}={:?}", ENV_THRESHOLD, raw),
            }
        }

        if let Some(session) = lookup(ENV_SESSION).filter(|v| !v.trim().is_empty()) {
            let session = session.trim();
            match validate_session_id(session) {
                Ok(()) => self.session_id = Some(session.to_string()),
                Err(e) => log::warn!("Ignoring {}: {}", ENV_SESSION, e),
            }
        }

        if let Some(raw) = lookup(ENV_VIRTUAL_TOOLS) {
            match parse_bool(&raw) {
                Some(enabled) => self.virtual_tools_enabled = enabled,
                None => log::warn!("Ignoring invalid {}={:?}", ENV_VIRTUAL_TOOLS, raw),
            }
        }
    }

    /// The configured session id, or a fresh UUID.
    pub fn resolved_session_id(&self) -> String {
        self.session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    /// Token counters with the configured families registered.
    pub fn token_counters(&self) -> ModelTokenCounters {
        let mut counters = ModelTokenCounters::new();
        for family in &self.model_families {
            let counter = match family.safety_margin {
                Some(margin) => HeuristicTokenCounter::new(family.chars_per_token, margin),
                None => HeuristicTokenCounter::with_ratio(family.chars_per_token),
            };
            counters.register(family.pattern.clone(), Arc::new(counter));
        }
        counters
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
