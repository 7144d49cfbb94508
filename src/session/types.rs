//! Session Types: broker configuration, connection status and the consumer-facing handler.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ValidationError;
use crate::topics::matcher::WILDCARD_MULTI;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl QosLevel {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(QosLevel::AtMostOnce),
            1 => Some(QosLevel::AtLeastOnce),
            2 => Some(QosLevel::ExactlyOnce),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        QosLevel::from_u8(value).ok_or_else(|| format!("qos must be 0, 1 or 2, got {}", value))
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        qos.as_u8()
    }
}

/// Connection settings. Passed by value into the session, which never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub tls: bool,
    pub qos: QosLevel,
    pub topic_filter: String,
    #[serde(alias = "topicFilters")]
    pub extra_topic_filters: Vec<String>,
    #[serde(alias = "defaultTopic")]
    pub default_publish_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "termqtt".to_string(),
            username: String::new(),
            password: String::new(),
            tls: false,
            qos: QosLevel::AtMostOnce,
            topic_filter: WILDCARD_MULTI.to_string(),
            extra_topic_filters: Vec::new(),
            default_publish_topic: String::new(),
        }
    }
}

impl BrokerConfig {
    /// Primary filter (`#` when blank) followed by the trimmed, non-blank,
    /// de-duplicated extras.
    pub fn active_filters(&self) -> Vec<String> {
        let primary = match self.topic_filter.trim() {
            "" => WILDCARD_MULTI.to_string(),
            trimmed => trimmed.to_string(),
        };
        let mut filters = vec![primary];
        for extra in &self.extra_topic_filters {
            let extra = extra.trim();
            if !extra.is_empty() && !filters.iter().any(|known| known == extra) {
                filters.push(extra.to_string());
            }
        }
        filters
    }

    pub fn url(&self) -> String {
        let scheme = if self.tls { "mqtts" } else { "mqtt" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::InvalidBrokerConfig("host is required".into()));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidBrokerConfig("port must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Transient: the transport keeps retrying.
    Error(String),
}

impl ConnectionStatus {
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("DISCONNECTED"),
            ConnectionStatus::Connecting => f.write_str("CONNECTING"),
            ConnectionStatus::Connected => f.write_str("CONNECTED"),
            ConnectionStatus::Error(_) => f.write_str("ERROR"),
        }
    }
}

/// Consumer side of the session. Invoked from the session task only.
pub trait SessionHandler: Send + 'static {
    fn on_status(&self, status: ConnectionStatus);
    fn on_message(&self, topic: String, payload: String);
    /// Exactly once per connect cycle, after every filter has been answered.
    fn on_subscription(&self, filter_label: String, summary: String);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Status(ConnectionStatus),
    Message { topic: String, payload: String },
    Subscription { filter_label: String, summary: String },
}

impl SessionHandler for mpsc::UnboundedSender<SessionUpdate> {
    fn on_status(&self, status: ConnectionStatus) {
        let _ = self.send(SessionUpdate::Status(status));
    }

    fn on_message(&self, topic: String, payload: String) {
        let _ = self.send(SessionUpdate::Message { topic, payload });
    }

    fn on_subscription(&self, filter_label: String, summary: String) {
        let _ = self.send(SessionUpdate::Subscription { filter_label, summary });
    }
}
