//! Editable (key, value) rows and their reconstruction into a payload.
//!
//! Keys are flattened paths (`a.b[2].c`), values are JSON literals typed by the
//! operator. A value that does not parse as JSON is kept as a plain string, so
//! strings are written quoted to survive a round trip (`"true"` vs `true`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::payload::flatten::{flatten, FlattenedEntry, ValueKind, EMPTY_ARRAY_PATH, EMPTY_OBJECT_PATH};
use crate::payload::json::{format_value, parse_json, pretty_json};
use crate::payload::path::{parse_path, PathToken};

/// Key of the single row holding a non-JSON payload verbatim.
pub const RAW_PAYLOAD_KEY: &str = "payload";

// Guards against a typo like `a[99999999]` allocating a huge array.
const MAX_ARRAY_INDEX: usize = 65_535;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: String,
    pub value: String,
}

impl TableRow {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorRows {
    pub rows: Vec<TableRow>,
    pub raw: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RebuiltPayload {
    Raw(String),
    Json(Value),
    Empty,
}

impl RebuiltPayload {
    pub fn value(&self) -> Option<&Value> {
        match self {
            RebuiltPayload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text to publish: raw verbatim, JSON pretty-printed, nothing for `Empty`.
    pub fn to_text(&self) -> String {
        match self {
            RebuiltPayload::Raw(text) => text.clone(),
            RebuiltPayload::Json(value) => pretty_json(value),
            RebuiltPayload::Empty => String::new(),
        }
    }
}

/// Parses the value column as a JSON literal, falling back to the text itself.
pub fn parse_value(value: &str) -> Value {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// Editor text for one flattened leaf.
pub fn entry_value_text(entry: &FlattenedEntry) -> String {
    match &entry.value {
        Value::String(_) => entry.value.to_string(),
        other => format_value(other),
    }
}

pub fn rows_from_entries(entries: &[FlattenedEntry]) -> Vec<TableRow> {
    entries
        .iter()
        .map(|entry| TableRow::new(entry.path.clone(), entry_value_text(entry)))
        .collect()
}

/// Seeds the editor from a received payload.
pub fn rows_from_payload(payload: &str) -> EditorRows {
    let Ok(value) = parse_json(payload) else {
        return EditorRows {
            rows: vec![TableRow::new(RAW_PAYLOAD_KEY, payload)],
            raw: true,
        };
    };

    let entries = flatten(&value, "");
    let only_sentinel = matches!(
        entries.as_slice(),
        [entry] if matches!(entry.kind, ValueKind::Object | ValueKind::Array)
            && (entry.path == EMPTY_OBJECT_PATH || entry.path == EMPTY_ARRAY_PATH)
    );
    if entries.is_empty() || only_sentinel {
        return EditorRows { rows: vec![TableRow::default()], raw: false };
    }

    EditorRows { rows: rows_from_entries(&entries), raw: false }
}

fn raw_passthrough(rows: &[TableRow], raw_mode: bool) -> Option<RebuiltPayload> {
    match rows {
        [row] if raw_mode && row.key == RAW_PAYLOAD_KEY => Some(RebuiltPayload::Raw(row.value.clone())),
        _ => None,
    }
}

/// Rebuilds a value from every row with a non-blank key. Nothing to build
/// yields an empty object.
pub fn rebuild_from_rows(rows: &[TableRow], raw_mode: bool) -> RebuiltPayload {
    if let Some(raw) = raw_passthrough(rows, raw_mode) {
        return raw;
    }
    let root = build(rows.iter());
    RebuiltPayload::Json(root.unwrap_or_else(|| Value::Object(Map::new())))
}

/// Like [`rebuild_from_rows`], but rows with a blank value are skipped and a
/// row loses to any other valued row that is one of its descendants.
pub fn preview_from_rows(rows: &[TableRow], raw_mode: bool) -> RebuiltPayload {
    if let Some(raw) = raw_passthrough(rows, raw_mode) {
        return raw;
    }

    let valued_keys: Vec<&str> = rows
        .iter()
        .filter(|row| !row.key.trim().is_empty() && !row.value.trim().is_empty())
        .map(|row| row.key.trim())
        .collect();

    let kept = rows.iter().filter(|row| {
        let key = row.key.trim();
        !row.value.trim().is_empty()
            && !valued_keys.iter().any(|other| is_descendant(other, key))
    });

    match build(kept) {
        Some(root) => RebuiltPayload::Json(root),
        None => RebuiltPayload::Empty,
    }
}

fn is_descendant(candidate: &str, key: &str) -> bool {
    candidate != key
        && candidate
            .strip_prefix(key)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}

fn build<'a>(rows: impl Iterator<Item = &'a TableRow>) -> Option<Value> {
    let mut root: Option<Value> = None;
    for row in rows {
        let key = row.key.trim();
        if key.is_empty() {
            continue;
        }
        let tokens = parse_path(key);
        let value = parse_value(&row.value);
        let Some(first) = tokens.first() else {
            root = Some(value);
            continue;
        };
        let slot = root.get_or_insert_with(|| {
            if first.is_index() { Value::Array(Vec::new()) } else { Value::Object(Map::new()) }
        });
        set_by_tokens(slot, &tokens, value);
    }
    root
}

/// Walks `tokens` from `slot`, creating containers on the way. An index token
/// makes its container an array, replacing whatever was there. A key token
/// turns a scalar into an object but never clobbers an array: the row is
/// skipped and the array kept.
pub fn set_by_tokens(slot: &mut Value, tokens: &[PathToken], value: Value) {
    let Some((head, rest)) = tokens.split_first() else {
        *slot = value;
        return;
    };

    match head {
        PathToken::Index(index) => {
            if *index > MAX_ARRAY_INDEX {
                tracing::warn!("Dropping edit: array index {} is above {}", index, MAX_ARRAY_INDEX);
                return;
            }
            let items = ensure_array(slot);
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            set_by_tokens(&mut items[*index], rest, value);
        }
        PathToken::Key(key) => {
            if slot.is_array() {
                tracing::warn!("Dropping edit: key '{}' addresses an array", key);
                return;
            }
            let fields = ensure_object(slot);
            let child = fields.entry(key.clone()).or_insert(Value::Null);
            set_by_tokens(child, rest, value);
        }
    }
}

fn ensure_array(slot: &mut Value) -> &mut Vec<Value> {
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just made an array"),
    }
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(fields) => fields,
        _ => unreachable!("slot was just made an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(key: &str, value: &str) -> TableRow {
        TableRow::new(key, value)
    }

    #[test]
    fn parse_value_follows_json_literals() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("-1.5e3"), json!(-1500.0));
        assert_eq!(parse_value("\"true\""), json!("true"));
        assert_eq!(parse_value("hello world"), json!("hello world"));
        assert_eq!(parse_value("   "), json!(""));
    }

    #[test]
    fn merges_shared_prefixes() {
        let payload = rebuild_from_rows(&[row("foo.bar.fizz", "1"), row("foo.bar.fuzz", "2")], false);
        assert_eq!(payload.value(), Some(&json!({"foo": {"bar": {"fizz": 1, "fuzz": 2}}})));
    }

    #[test]
    fn supports_array_paths() {
        let payload = rebuild_from_rows(
            &[row("items[0].name", "\"a\""), row("items[1].name", "\"b\"")],
            false,
        );
        assert_eq!(payload.value(), Some(&json!({"items": [{"name": "a"}, {"name": "b"}]})));
    }

    #[test]
    fn numeric_first_token_makes_root_array() {
        let payload = rebuild_from_rows(&[row("[1]", "2")], false);
        assert_eq!(payload.value(), Some(&json!([null, 2])));
    }

    #[test]
    fn index_token_promotes_existing_value_to_array() {
        let payload = rebuild_from_rows(&[row("a", "5"), row("a[0]", "1")], false);
        assert_eq!(payload.value(), Some(&json!({"a": [1]})));
    }

    #[test]
    fn key_token_keeps_existing_array() {
        let payload = rebuild_from_rows(&[row("a[0]", "1"), row("a.b", "2")], false);
        assert_eq!(payload.value(), Some(&json!({"a": [1]})));

        let payload = rebuild_from_rows(&[row("a", "5"), row("a.b", "2")], false);
        assert_eq!(payload.value(), Some(&json!({"a": {"b": 2}})));
    }

    #[test]
    fn oversized_index_drops_only_that_edit() {
        let payload = rebuild_from_rows(&[row("a[70000]", "1"), row("b", "2")], false);
        assert_eq!(payload.value(), Some(&json!({"a": null, "b": 2})));
    }

    #[test]
    fn tokenless_key_replaces_whole_result() {
        let payload = rebuild_from_rows(&[row("a", "1"), row(".", "42")], false);
        assert_eq!(payload.value(), Some(&json!(42)));
    }

    #[test]
    fn blank_keys_are_skipped_and_empty_rows_rebuild_to_object() {
        let payload = rebuild_from_rows(&[row("  ", "1")], false);
        assert_eq!(payload.value(), Some(&json!({})));
        assert_eq!(payload.to_text(), "{}");
    }

    #[test]
    fn raw_mode_passes_single_payload_row_through() {
        let rows = [row(RAW_PAYLOAD_KEY, "not { json")];
        assert_eq!(rebuild_from_rows(&rows, true), RebuiltPayload::Raw("not { json".into()));
        assert_eq!(preview_from_rows(&rows, true).to_text(), "not { json");
        // without raw mode the row is just a key named "payload"
        assert_eq!(rebuild_from_rows(&rows, false).value(), Some(&json!({"payload": "not { json"})));
    }

    #[test]
    fn preview_ignores_parent_when_child_exists() {
        let preview = preview_from_rows(&[row("foo.bar.buzz", "2"), row("foo.bar", "test")], false);
        let text = preview.to_text();
        assert!(text.contains("buzz"));
        assert!(!text.contains("test"));
    }

    #[test]
    fn preview_of_blank_values_is_empty() {
        let preview = preview_from_rows(&[row("foo", "")], false);
        assert_eq!(preview, RebuiltPayload::Empty);
        assert_eq!(preview.to_text(), "");
    }

    #[test]
    fn preview_keeps_parent_when_child_value_is_blank() {
        let preview = preview_from_rows(&[row("foo", "1"), row("foo.bar", " ")], false);
        assert_eq!(preview.value(), Some(&json!({"foo": 1})));
    }

    #[test]
    fn descendant_check_requires_separator() {
        assert!(is_descendant("foo.bar", "foo"));
        assert!(is_descendant("foo[0]", "foo"));
        assert!(!is_descendant("foobar", "foo"));
        assert!(!is_descendant("foo", "foo"));
    }

    #[test]
    fn rows_from_payload_quotes_strings() {
        let editor = rows_from_payload(r#"{"name":"x","on":true,"tags":[]}"#);
        assert!(!editor.raw);
        assert_eq!(
            editor.rows,
            vec![row("name", "\"x\""), row("on", "true"), row("tags", "[]")]
        );
    }

    #[test]
    fn rows_from_invalid_payload_are_raw() {
        let editor = rows_from_payload("plain text");
        assert!(editor.raw);
        assert_eq!(editor.rows, vec![row(RAW_PAYLOAD_KEY, "plain text")]);
    }

    #[test]
    fn rows_from_empty_container_are_blank() {
        assert_eq!(rows_from_payload("{}").rows, vec![TableRow::default()]);
        assert_eq!(rows_from_payload("[]").rows, vec![TableRow::default()]);
    }
}
