use agent_core::tools::ToolError;
use thiserror::Error;

/// Errors raised by the output store and the large-output virtual tools.
///
/// Extraction and classification never fail; they degrade instead, so they
/// have no variant here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("failed to write tool output to {path}: {message}")]
    WriteFailed { path: String, message: String },

    /// The filename is not a reference this store could have produced.
    /// The message is the same for every rejected name.
    #[error(
        "invalid output reference '{0}': expected a file name like tool_<YYYYMMDD>_<HHMMSS>_<tool>.json"
    )]
    InvalidReference(String),

    /// The session id cannot name a single directory under the output root.
    #[error("invalid session id '{0}': must be a single directory name without separators or '..'")]
    InvalidSession(String),

    #[error("large output virtual tools are disabled")]
    FeatureDisabled,

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("tool output file not found: {0}")]
    NotFound(String),

    #[error("failed to read tool output {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("unknown large output tool: {0}")]
    UnknownTool(String),
}

impl OutputError {
    pub(crate) fn write_failed(path: impl AsRef<std::path::Path>, error: impl std::fmt::Display) -> Self {
        OutputError::WriteFailed {
            path: path.as_ref().display().to_string(),
            message: error.to_string(),
        }
    }

    pub(crate) fn read_failed(path: impl AsRef<std::path::Path>, error: impl std::fmt::Display) -> Self {
        OutputError::ReadFailed {
            path: path.as_ref().display().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<OutputError> for ToolError {
    fn from(error: OutputError) -> Self {
        let message = error.to_string();
        match error {
            OutputError::InvalidReference(_) => ToolError::InvalidReference(message),
            OutputError::FeatureDisabled => ToolError::FeatureDisabled(message),
            OutputError::NotFound(_) | OutputError::UnknownTool(_) => ToolError::NotFound(message),
            OutputError::InvalidArguments(_) => ToolError::InvalidArguments(message),
            OutputError::WriteFailed { .. }
            | OutputError::ReadFailed { .. }
            | OutputError::InvalidSession(_)
            | OutputError::QueryFailed(_) => ToolError::Execution(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, OutputError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_reference_message_does_not_leak_reason() {
        let traversal = OutputError::InvalidReference("../etc/passwd".to_string()).to_string();
        let unknown = OutputError::InvalidReference("notes.txt".to_string()).to_string();

        let strip = |s: &str| s.split('\'').nth(2).unwrap_or_default().to_string();
        assert_eq!(strip(&traversal), strip(&unknown));
    }

    #[test]
    fn maps_to_distinct_tool_errors() {
        assert!(matches!(
            ToolError::from(OutputError::FeatureDisabled),
            ToolError::FeatureDisabled(_)
        ));
        assert!(matches!(
            ToolError::from(OutputError::NotFound("x".to_string())),
            ToolError::NotFound(_)
        ));
        assert!(matches!(
            ToolError::from(OutputError::InvalidReference("x".to_string())),
            ToolError::InvalidReference(_)
        ));
    }
}
