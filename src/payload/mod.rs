//! Payload Codec: structured value <-> flat list of editable (path, value) rows.

pub mod flatten;
pub mod json;
pub mod path;
pub mod rows;

pub use flatten::{flatten, FlattenedEntry, ValueKind};
pub use json::{format_value, parse_json, pretty_json};
pub use path::{parse_path, PathToken};
pub use rows::{
    preview_from_rows, rebuild_from_rows, rows_from_entries, rows_from_payload, EditorRows,
    RebuiltPayload, TableRow,
};
