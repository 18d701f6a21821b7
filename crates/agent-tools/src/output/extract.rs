//! Unwrapping of transport envelopes around tool results.
//!
//! Tool servers hand results back wrapped in MCP content items
//! (`{"type":"text","text":"..."}`), arrays of them, or the legacy
//! `TOOL RESULT for <name>: <payload>` prefix. Storage and classification
//! work on the payload inside.

use serde_json::Value;

const LEGACY_PREFIX: &str = "TOOL RESULT for ";

/// Return the innermost textual payload of a raw tool result.
///
/// Envelopes are peeled until none is left, so running this on its own
/// output returns the same string. Anything that does not decode is
/// returned unchanged.
pub fn extract_actual_content(raw: &str) -> String {
    let mut current = raw.to_string();

    // Every unwrap strictly shortens the string, so this terminates.
    while let Some(inner) = unwrap_once(&current) {
        if inner.len() >= current.len() {
            break;
        }
        current = inner;
    }

    current
}

fn unwrap_once(content: &str) -> Option<String> {
    unwrap_legacy_prefix(content).or_else(|| unwrap_envelope(content))
}

fn unwrap_legacy_prefix(content: &str) -> Option<String> {
    let rest = content.trim_start().strip_prefix(LEGACY_PREFIX)?;
    match rest.split_once(": ") {
        Some((_tool_name, payload)) => Some(payload.to_string()),
        None => {
            log::debug!("Legacy tool result prefix without payload separator, keeping as-is");
            None
        }
    }
}

fn unwrap_envelope(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(error) => {
            log::debug!("Tool result is not decodable JSON, skipping extraction: {}", error);
            return None;
        }
    };

    match &value {
        Value::Object(_) => text_item(&value).map(str::to_string),
        Value::Array(items) if !items.is_empty() => {
            let texts: Option<Vec<&str>> = items.iter().map(text_item).collect();
            texts.map(|texts| texts.join("\n"))
        }
        _ => None,
    }
}

/// The `text` of an MCP text content item, if `value` is one.
fn text_item(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    if object.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    object.get("text").and_then(Value::as_str)
}
