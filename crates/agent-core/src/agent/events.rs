use serde::{Deserialize, Serialize};

/// Events reported to the agent loop while tool results are processed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Emitted when a tool result crosses the large-output threshold
    LargeToolOutputDetected {
        tool_name: String,
        output_size: usize,
        token_count: Option<u32>,
        threshold: u32,
        output_folder: String,
    },

    /// Emitted after a large tool result has been stored on disk
    LargeToolOutputFileWritten {
        tool_name: String,
        file_path: String,
        output_size: usize,
        preview: String,
    },

    /// Emitted when storing a large tool result failed
    LargeToolOutputFileWriteError {
        tool_name: String,
        error: String,
        output_size: usize,
        fallback_used: bool,
    },
}
