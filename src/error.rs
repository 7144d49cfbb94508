//! Error taxonomy shared by the registry, codec, session and storage layers.
//!
//! None of these ever cross the session boundary as a panic: connection and
//! subscription failures are folded into status/summary notices, payload parse
//! failures are kept next to the raw text, validation failures are returned
//! synchronously before anything reaches the broker.

use thiserror::Error;

/// Inbound payload that is not valid structured data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePayloadError {
    #[error("empty payload")]
    Empty,
    #[error("{0}")]
    Invalid(String),
}

impl From<serde_json::Error> for ParsePayloadError {
    fn from(error: serde_json::Error) -> Self {
        ParsePayloadError::Invalid(error.to_string())
    }
}

/// Transport-level failure. Reported through the status channel, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("{0}")]
    Transport(String),
}

/// A filter that was rejected or never acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("subscription rejected: {filter}")]
    Rejected { filter: String },
    #[error("subscribe to '{filter}' failed: {message}")]
    Failed { filter: String, message: String },
    #[error("no acknowledgement for '{filter}'")]
    Timeout { filter: String },
}

/// Caller-side input rejected before reaching the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("topic is required")]
    EmptyTopic,
    #[error("filter pattern is required")]
    EmptyFilterPattern,
    #[error("'{0}' is not a publishable topic: wildcards are only valid in filters")]
    WildcardTopic(String),
    #[error("invalid broker config: {0}")]
    InvalidBrokerConfig(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
