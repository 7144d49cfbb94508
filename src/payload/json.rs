use serde_json::Value;

use crate::error::ParsePayloadError;

/// Parses an inbound payload. NUL bytes some publishers pad with are dropped first.
pub fn parse_json(input: &str) -> Result<Value, ParsePayloadError> {
    let cleaned: String = input.chars().filter(|c| *c != '\0').collect();
    if cleaned.trim().is_empty() {
        return Err(ParsePayloadError::Empty);
    }
    Ok(serde_json::from_str(&cleaned)?)
}

pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Display form of a single value: strings verbatim, containers as compact JSON.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
