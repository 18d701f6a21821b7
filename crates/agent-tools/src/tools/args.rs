//! Argument extraction for virtual tool calls.
//!
//! Models send integers as `10`, `10.0` or occasionally `"10"`; all three
//! are accepted.

use serde_json::Value;

use crate::output::OutputError;

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, OutputError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| OutputError::InvalidArguments(format!("Missing '{key}' parameter")))
}

pub(crate) fn required_int(args: &Value, key: &str) -> Result<i64, OutputError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(OutputError::InvalidArguments(format!(
            "Missing '{key}' parameter"
        ))),
        Some(value) => as_integer(value).ok_or_else(|| {
            OutputError::InvalidArguments(format!("'{key}' must be an integer"))
        }),
    }
}

pub(crate) fn optional_int(args: &Value, key: &str) -> Result<Option<i64>, OutputError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_int(args, key).map(Some),
    }
}

pub(crate) fn optional_bool(args: &Value, key: &str, default: bool) -> Result<bool, OutputError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(value)) => Ok(*value),
        Some(Value::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(OutputError::InvalidArguments(format!("'{key}' must be a boolean"))),
        },
        Some(_) => Err(OutputError::InvalidArguments(format!("'{key}' must be a boolean"))),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}
