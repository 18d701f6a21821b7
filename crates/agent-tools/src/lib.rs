//! Large tool output offloading and virtual access.
//!
//! Tool results above a model-aware token threshold are written to a
//! per-session directory and replaced by a short reference. The model then
//! reads, searches or queries the stored file through three virtual tools
//! instead of receiving the whole payload.

pub mod output;
pub mod tools;

pub use output::{
    extract_actual_content, OffloadingToolExecutor, OutputClassification, OutputClassifier,
    OutputDisposition, OutputError, OutputReference, SessionOutputStore, StoredOutput,
    ToolOutputConfig, ToolOutputHandler, DEFAULT_LARGE_OUTPUT_THRESHOLD,
};
pub use tools::{
    is_large_output_tool, LargeOutputRouter, LargeOutputTool, QueryLargeOutputTool,
    ReadLargeOutputTool, SearchLargeOutputTool,
};
