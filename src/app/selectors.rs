//! Read-only views derived from [`AppState`] for whatever renders it.

use serde::Serialize;
use serde_json::Value;

use crate::app::state::{AppState, TopicMessage};
use crate::payload::{flatten, format_value, pretty_json, FlattenedEntry, ValueKind};
use crate::topics::{build_tree, filtered_topics, first_leaf_path, visible_entries, TopicEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLines {
    pub line1: String,
    pub line2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailsContent {
    pub content: String,
    pub is_json: bool,
}

fn visible_topics(state: &AppState) -> Vec<String> {
    filtered_topics(&state.topics, &state.exclude_filters, &state.search_query)
}

pub fn topic_tree_entries(state: &AppState) -> Vec<TopicEntry> {
    visible_entries(&build_tree(&visible_topics(state)), &state.expansion)
}

pub fn first_leaf_topic_path(state: &AppState, parent_path: &str) -> Option<String> {
    first_leaf_path(&build_tree(&visible_topics(state)), parent_path)
}

fn text_entry(path: &str, text: String) -> FlattenedEntry {
    FlattenedEntry {
        path: path.to_string(),
        value: Value::String(text),
        kind: ValueKind::String,
    }
}

/// Flattened payload, or `error`/`raw` rows when it is not JSON.
pub fn payload_entries(message: Option<&TopicMessage>) -> Vec<FlattenedEntry> {
    let Some(message) = message else {
        return Vec::new();
    };
    if let Some(json) = &message.json {
        return flatten(json, "");
    }
    let mut entries = Vec::new();
    if let Some(error) = &message.error {
        entries.push(text_entry("error", format!("JSON parse error: {}", error)));
    }
    entries.push(text_entry("raw", message.payload.clone()));
    entries
}

pub fn watch_options(state: &AppState) -> Vec<SelectOption> {
    state
        .watchlist
        .iter()
        .map(|entry| {
            let value = state
                .messages
                .get(&entry.topic)
                .and_then(|msg| msg.json.as_ref())
                .and_then(|json| flatten(json, "").into_iter().find(|item| item.path == entry.path))
                .map(|item| format_value(&item.value))
                .unwrap_or_default();
            SelectOption {
                name: format!("{}:{}", entry.topic, entry.path),
                description: value,
            }
        })
        .collect()
}

pub fn favourite_options(state: &AppState) -> Vec<SelectOption> {
    state
        .favourites
        .iter()
        .map(|fav| SelectOption {
            name: fav.display_name().to_string(),
            description: if fav.alias.is_some() { fav.topic.clone() } else { String::new() },
        })
        .collect()
}

pub fn status_lines(state: &AppState) -> StatusLines {
    let broker = &state.broker;
    let filter = match broker.topic_filter.trim() {
        "" => "#",
        filter => filter,
    };
    let search = if state.search_query.is_empty() {
        "search:off".to_string()
    } else {
        format!("search:{}", state.search_query)
    };
    let excludes = state.exclude_filters.iter().filter(|f| f.enabled).count();
    let line1 = format!("{}  broker:{}:{}  filter:{}  {}", state.status, broker.host, broker.port, filter, search);

    let mut line2 = format!("messages:{}  excludes:{}", state.message_count, excludes);
    if let Some(error) = state.connection_error() {
        line2.push_str(&format!(" error:{}", error));
    }
    if state.updates_paused {
        line2.push_str(" paused");
    }

    StatusLines { line1, line2 }
}

pub fn details_content(message: Option<&TopicMessage>) -> DetailsContent {
    match message {
        None => DetailsContent { content: "No message selected".to_string(), is_json: false },
        Some(TopicMessage { json: Some(json), .. }) => DetailsContent { content: pretty_json(json), is_json: true },
        Some(message) => DetailsContent { content: message.payload.clone(), is_json: false },
    }
}
