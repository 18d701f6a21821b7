//! Large tool output handling: extraction, classification, storage and
//! the integration with the tool-calling loop.

pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod handler;
pub mod store;

pub use classifier::{
    byte_threshold, OutputClassification, OutputClassifier, SizeCriterion,
    DEFAULT_LARGE_OUTPUT_THRESHOLD,
};
pub use config::{ModelFamilyConfig, ToolOutputConfig, DEFAULT_OUTPUT_FOLDER};
pub use error::{OutputError, Result};
pub use executor::OffloadingToolExecutor;
pub use extract::extract_actual_content;
pub use handler::{OutputDisposition, ToolOutputHandler, PREVIEW_CHARS};
pub use store::{
    infer_extension, preview, sanitize_tool_name, OutputReference, SessionOutputStore,
    validate_session_id, StoredOutput,
};
