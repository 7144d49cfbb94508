//! Application state owned by the orchestrator task.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::parse_json;
use crate::session::{BrokerConfig, ConnectionStatus};
use crate::topics::{default_exclude_filters, ExcludeFilter, ExpansionMap};

/// Last message seen on a topic. Invalid JSON keeps the raw text plus the parse error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessage {
    pub topic: String,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl TopicMessage {
    pub fn parse(topic: String, payload: String, received_at: DateTime<Utc>) -> Self {
        let (json, error) = match parse_json(&payload) {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self { topic, payload, json, error, received_at }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favourite {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Favourite {
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.topic)
    }
}

/// One flattened payload path pinned on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub topic: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMessage {
    pub name: String,
    pub topic: String,
    pub payload: String,
}

/// The slices of [`AppState`] that survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub broker: BrokerConfig,
    pub favourites: Vec<Favourite>,
    pub watchlist: Vec<WatchEntry>,
    pub saved_messages: Vec<SavedMessage>,
    pub exclude_filters: Vec<ExcludeFilter>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            favourites: Vec::new(),
            watchlist: Vec::new(),
            saved_messages: Vec::new(),
            exclude_filters: default_exclude_filters(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub broker: BrokerConfig,
    pub status: ConnectionStatus,
    pub message_count: u64,
    pub last_message_topic: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_subscription: Option<String>,
    pub subscription_info: Option<String>,
    pub updates_paused: bool,
    pub expansion: ExpansionMap,
    /// Sorted, unique. Shared with published snapshots.
    pub topics: Arc<Vec<String>>,
    /// Last message per topic. Shared with published snapshots.
    pub messages: Arc<BTreeMap<String, Arc<TopicMessage>>>,
    pub favourites: Vec<Favourite>,
    pub watchlist: Vec<WatchEntry>,
    pub saved_messages: Vec<SavedMessage>,
    pub exclude_filters: Vec<ExcludeFilter>,
    pub search_query: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_broker(BrokerConfig::default())
    }
}

impl AppState {
    pub fn with_broker(broker: BrokerConfig) -> Self {
        Self {
            broker,
            status: ConnectionStatus::Disconnected,
            message_count: 0,
            last_message_topic: None,
            last_message_at: None,
            last_subscription: None,
            subscription_info: None,
            updates_paused: false,
            expansion: ExpansionMap::new(),
            topics: Arc::default(),
            messages: Arc::default(),
            favourites: Vec::new(),
            watchlist: Vec::new(),
            saved_messages: Vec::new(),
            exclude_filters: default_exclude_filters(),
            search_query: String::new(),
        }
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.status.error_message()
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            broker: self.broker.clone(),
            favourites: self.favourites.clone(),
            watchlist: self.watchlist.clone(),
            saved_messages: self.saved_messages.clone(),
            exclude_filters: self.exclude_filters.clone(),
        }
    }

    pub fn message(&self, topic: &str) -> Option<&TopicMessage> {
        self.messages.get(topic).map(Arc::as_ref)
    }

    pub fn is_favourite(&self, topic: &str) -> bool {
        self.favourites.iter().any(|f| f.topic == topic)
    }
}
