//! Glue between the tool-calling loop and the large-output layer.
//!
//! Every tool result passes through [`ToolOutputHandler::process`]: it is
//! unwrapped, classified, and either returned inline or written to the
//! session store and replaced by a short message naming the file.

use std::sync::Arc;

use agent_core::tools::{ToolCall, ToolResult};
use agent_core::AgentEvent;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::classifier::{OutputClassification, OutputClassifier};
use super::config::ToolOutputConfig;
use super::error::Result;
use super::extract::extract_actual_content;
use super::store::{preview, SessionOutputStore, StoredOutput};
use crate::tools::{LargeOutputRouter, LargeOutputTool};

/// Characters of the stored payload echoed back in the offload message.
pub const PREVIEW_CHARS: usize = 100;

/// What became of a processed tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputDisposition {
    /// Small enough to hand to the model as-is.
    Inline(String),
    /// Written to disk; `message` replaces the payload in the conversation.
    Offloaded {
        stored: StoredOutput,
        message: String,
        classification: OutputClassification,
    },
}

impl OutputDisposition {
    /// Text to place in the conversation.
    pub fn content(&self) -> &str {
        match self {
            OutputDisposition::Inline(content) => content,
            OutputDisposition::Offloaded { message, .. } => message,
        }
    }

    pub fn is_offloaded(&self) -> bool {
        matches!(self, OutputDisposition::Offloaded { .. })
    }
}

pub struct ToolOutputHandler {
    store: RwLock<Arc<SessionOutputStore>>,
    classifier: OutputClassifier,
    event_tx: Option<mpsc::Sender<AgentEvent>>,
}

impl ToolOutputHandler {
    pub fn new(store: Arc<SessionOutputStore>, classifier: OutputClassifier) -> Self {
        Self {
            store: RwLock::new(store),
            classifier,
            event_tx: None,
        }
    }

    pub fn from_config(config: &ToolOutputConfig) -> Self {
        Self::new(
            Arc::new(SessionOutputStore::from_config(config)),
            OutputClassifier::new(config.token_counters()),
        )
    }

    /// Send large-output events to `event_tx`.
    pub fn with_event_sender(mut self, event_tx: mpsc::Sender<AgentEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn store(&self) -> Arc<SessionOutputStore> {
        Arc::clone(&self.store.read())
    }

    /// Swap in a different store, e.g. when a new session starts.
    pub fn set_store(&self, store: Arc<SessionOutputStore>) {
        *self.store.write() = store;
    }

    pub fn classifier(&self) -> &OutputClassifier {
        &self.classifier
    }

    /// Router over the current store, gated by its virtual tools flag.
    pub fn router(&self) -> LargeOutputRouter {
        let store = self.store();
        let enabled = store.virtual_tools_enabled();
        LargeOutputRouter::new(store, enabled)
    }

    /// Takes effect for routers created after the call.
    pub fn set_virtual_tools_enabled(&self, enabled: bool) {
        self.store().set_virtual_tools_enabled(enabled);
    }

    pub fn count_tokens(&self, payload: &str, model_id: &str) -> u32 {
        self.classifier.count_tokens(payload, model_id)
    }

    /// Classify `payload` after envelope extraction, against the store's threshold.
    pub fn classify(&self, payload: &str, model_id: Option<&str>) -> OutputClassification {
        let content = extract_actual_content(payload);
        self.classifier
            .classify(&content, model_id, self.store().threshold())
    }

    pub fn is_large(&self, payload: &str, model_id: Option<&str>) -> bool {
        self.classify(payload, model_id).is_large
    }

    /// Offload `raw` if it is large, otherwise return it unchanged.
    ///
    /// A write failure is returned to the caller; the detected event has
    /// already been sent at that point.
    pub async fn process(
        &self,
        tool_name: &str,
        raw: &str,
        model_id: Option<&str>,
    ) -> Result<OutputDisposition> {
        let store = self.store();
        if !store.enabled() {
            return Ok(OutputDisposition::Inline(raw.to_string()));
        }

        let content = extract_actual_content(raw);
        let classification = self
            .classifier
            .classify(&content, model_id, store.threshold());
        if !classification.is_large {
            return Ok(OutputDisposition::Inline(raw.to_string()));
        }

        self.emit(AgentEvent::LargeToolOutputDetected {
            tool_name: tool_name.to_string(),
            output_size: classification.byte_len,
            token_count: classification.token_count,
            threshold: classification.threshold,
            output_folder: store.session_dir().display().to_string(),
        })
        .await;

        let stored = store.write(&content, tool_name).await?;
        let content_preview = preview(&content, PREVIEW_CHARS);

        self.emit(AgentEvent::LargeToolOutputFileWritten {
            tool_name: tool_name.to_string(),
            file_path: stored.path.display().to_string(),
            output_size: classification.byte_len,
            preview: content_preview.to_string(),
        })
        .await;

        log::info!(
            "Offloaded '{}' output: {} bytes, {:?} tokens, threshold {}, file {}",
            tool_name,
            classification.byte_len,
            classification.token_count,
            classification.threshold,
            stored.path.display()
        );

        let message = offload_message(
            &stored,
            &classification,
            content_preview,
            store.virtual_tools_enabled(),
        );
        Ok(OutputDisposition::Offloaded {
            stored,
            message,
            classification,
        })
    }

    /// Run a finished tool result through [`process`](Self::process).
    ///
    /// Failed results are offloaded too and keep their `success` flag and
    /// display preference. If the write fails the full payload stays inline.
    pub async fn process_tool_result(
        &self,
        call: &ToolCall,
        result: ToolResult,
        model_id: Option<&str>,
    ) -> ToolResult {
        let tool_name = &call.function.name;
        match self.process(tool_name, &result.result, model_id).await {
            Ok(OutputDisposition::Inline(_)) => result,
            Ok(OutputDisposition::Offloaded { message, .. }) => ToolResult {
                result: message,
                ..result
            },
            Err(error) => {
                log::warn!(
                    "Failed to store large output of '{}', keeping it inline: {}",
                    tool_name,
                    error
                );
                self.emit(AgentEvent::LargeToolOutputFileWriteError {
                    tool_name: tool_name.to_string(),
                    error: error.to_string(),
                    output_size: result.result.len(),
                    fallback_used: true,
                })
                .await;
                result
            }
        }
    }

    async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

fn offload_message(
    stored: &StoredOutput,
    classification: &OutputClassification,
    content_preview: &str,
    virtual_tools_enabled: bool,
) -> String {
    let size = match classification.token_count {
        Some(tokens) => format!("{} bytes, ~{} tokens", stored.size, tokens),
        None => format!("{} bytes", stored.size),
    };

    let mut message = format!(
        "Tool output was too large to include ({size}) and has been saved to file: {}\n\nPreview:\n{}",
        stored.reference, content_preview
    );
    if content_preview.len() < stored.size as usize {
        message.push_str("...");
    }

    if virtual_tools_enabled {
        let [read, search, query] = LargeOutputTool::ALL.map(LargeOutputTool::name);
        message.push_str(&format!(
            "\n\nUse these tools with filename \"{}\" to inspect it:\n\
             - {read}: read characters start..end (1-based, inclusive)\n\
             - {search}: find regex matches with line numbers and character positions\n\
             - {query}: run a jq query (JSON files only)",
            stored.reference
        ));
    }

    message
}
