use std::sync::Arc;

use agent_core::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::output::{OutputError, SessionOutputStore};

use super::args::{required_int, required_str};

/// Reads an inclusive, 1-based character range from a stored output.
pub struct ReadLargeOutputTool {
    store: Arc<SessionOutputStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadLargeOutputArgs {
    pub filename: String,
    pub start: usize,
    pub end: usize,
}

impl ReadLargeOutputArgs {
    pub fn from_value(args: &Value) -> Result<Self, OutputError> {
        let filename = required_str(args, "filename")?.to_string();
        let start = required_int(args, "start")?;
        let end = required_int(args, "end")?;

        if start < 1 {
            return Err(OutputError::InvalidArguments(
                "'start' must be 1 or greater".to_string(),
            ));
        }
        if end < start {
            return Err(OutputError::InvalidArguments(
                "'end' must be greater than or equal to 'start'".to_string(),
            ));
        }

        Ok(Self {
            filename,
            start: start as usize,
            end: usize::try_from(end).unwrap_or(usize::MAX),
        })
    }
}

impl ReadLargeOutputTool {
    pub const NAME: &'static str = "read_large_output";

    pub fn new(store: Arc<SessionOutputStore>) -> Self {
        Self { store }
    }

    /// Validate `args`, load the referenced file and slice it.
    pub async fn read(&self, args: &Value) -> Result<String, OutputError> {
        let args = ReadLargeOutputArgs::from_value(args)?;
        let content = self.store.read(&args.filename).await?;
        Ok(Self::read_range(&content, args.start, args.end))
    }

    /// Characters `start..=end` (1-based) of `content`, clamped to its length.
    pub fn read_range(content: &str, start: usize, end: usize) -> String {
        if start == 0 || end < start {
            return String::new();
        }
        content
            .chars()
            .skip(start - 1)
            .take(end - start + 1)
            .collect()
    }
}

#[async_trait]
impl Tool for ReadLargeOutputTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Read specific characters from a large tool output file. Positions are 1-based and the end is inclusive; ranges past the end of the file are clamped"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name of the tool output file (e.g., tool_20250721_091511_tavily-search.json)"
                },
                "start": {
                    "type": "integer",
                    "description": "Starting character position (1-based)"
                },
                "end": {
                    "type": "integer",
                    "description": "Ending character position (inclusive)"
                }
            },
            "required": ["filename", "start", "end"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(self.read(&args).await?))
    }
}
