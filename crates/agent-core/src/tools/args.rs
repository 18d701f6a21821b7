use super::executor::ToolError;

/// Parse the raw JSON arguments of a tool call.
///
/// Empty or whitespace-only arguments are treated as an empty object.
pub fn parse_tool_args(arguments: &str) -> std::result::Result<serde_json::Value, ToolError> {
    let args_raw = arguments.trim();

    if args_raw.is_empty() {
        return Ok(serde_json::json!({}));
    }

    serde_json::from_str(args_raw)
        .map_err(|error| ToolError::InvalidArguments(format!("Invalid JSON arguments: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_arguments_become_empty_object() {
        assert_eq!(parse_tool_args("  ").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn malformed_arguments_are_invalid() {
        let error = parse_tool_args("{not json").unwrap_err();
        assert!(matches!(error, ToolError::InvalidArguments(_)));
    }
}
