use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Null,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Null => "null",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// One leaf of a flattened value. `value` is a scalar, null, or an empty container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedEntry {
    pub path: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub kind: ValueKind,
}

impl FlattenedEntry {
    fn new(path: String, value: &Value) -> Self {
        Self {
            path,
            kind: ValueKind::of(value),
            value: value.clone(),
        }
    }
}

pub const EMPTY_OBJECT_PATH: &str = "{}";
pub const EMPTY_ARRAY_PATH: &str = "[]";
pub const ROOT_SCALAR_PATH: &str = "value";

/// Object fields extend the path with `.key`, array items with `[i]`.
pub fn flatten(value: &Value, prefix: &str) -> Vec<FlattenedEntry> {
    let mut entries = Vec::new();
    flatten_into(value, prefix, &mut entries);
    entries
}

fn flatten_into(value: &Value, prefix: &str, entries: &mut Vec<FlattenedEntry>) {
    match value {
        Value::Array(items) if items.is_empty() => {
            entries.push(FlattenedEntry::new(or_default(prefix, EMPTY_ARRAY_PATH), value));
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(item, &format!("{}[{}]", prefix, index), entries);
            }
        }
        Value::Object(fields) if fields.is_empty() => {
            entries.push(FlattenedEntry::new(or_default(prefix, EMPTY_OBJECT_PATH), value));
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                let next = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };
                flatten_into(field, &next, entries);
            }
        }
        scalar => {
            entries.push(FlattenedEntry::new(or_default(prefix, ROOT_SCALAR_PATH), scalar));
        }
    }
}

fn or_default(prefix: &str, fallback: &str) -> String {
    if prefix.is_empty() { fallback.to_string() } else { prefix.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(entries: &[FlattenedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn flattens_objects_and_arrays() {
        let entries = flatten(&json!({"a": {"b": 1}, "c": [true]}), "");
        assert_eq!(paths(&entries), vec!["a.b", "c[0]"]);
        assert_eq!(entries[0].kind, ValueKind::Number);
        assert_eq!(entries[1].kind, ValueKind::Boolean);
    }

    #[test]
    fn nested_arrays_use_bracket_segments() {
        let entries = flatten(&json!({"a": {"b": [0, 1, {"c": null}]}}), "");
        assert_eq!(paths(&entries), vec!["a.b[0]", "a.b[1]", "a.b[2].c"]);
        assert_eq!(entries[2].kind, ValueKind::Null);
    }

    #[test]
    fn empty_containers_yield_sentinels() {
        assert_eq!(paths(&flatten(&json!({}), "")), vec!["{}"]);
        assert_eq!(paths(&flatten(&json!([]), "")), vec!["[]"]);

        let entries = flatten(&json!({"tags": []}), "");
        assert_eq!(paths(&entries), vec!["tags"]);
        assert_eq!(entries[0].kind, ValueKind::Array);
    }

    #[test]
    fn root_scalar_gets_value_path() {
        let entries = flatten(&json!("hello"), "");
        assert_eq!(paths(&entries), vec!["value"]);
        assert_eq!(entries[0].kind, ValueKind::String);
    }

    #[test]
    fn prefix_is_prepended() {
        let entries = flatten(&json!({"x": 1}), "root");
        assert_eq!(paths(&entries), vec!["root.x"]);
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ValueKind::Boolean).unwrap(), "\"boolean\"");
        assert_eq!(ValueKind::Object.to_string(), "object");
    }
}
