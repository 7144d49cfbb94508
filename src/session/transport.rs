//! Transport seam between the session actor and the pub/sub client library.
//!
//! A transport opens one connection per generation and reports everything it
//! observes through an [`EventSink`]. Events are stamped with the generation
//! they were opened under so the session can discard late arrivals from a
//! connection it already replaced.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::ConnectionError;
use crate::session::QosLevel;

/// QoS value a broker grants to reject a filter.
pub const SUBACK_FAILURE: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive: Duration,
    /// Fixed retry interval, owned by the transport's reconnect loop.
    pub reconnect_period: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedQos {
    pub filter: String,
    pub qos: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckError {
    pub message: String,
    pub reason_code: Option<u8>,
    pub reason_text: Option<String>,
}

impl AckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }
}

/// Answer to one subscribe call: what the broker granted and/or what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeAck {
    pub granted: Vec<GrantedQos>,
    pub error: Option<AckError>,
}

impl SubscribeAck {
    pub fn granted(filter: impl Into<String>, qos: u8) -> Self {
        Self {
            granted: vec![GrantedQos { filter: filter.into(), qos }],
            error: None,
        }
    }

    pub fn failed(error: AckError) -> Self {
        Self { granted: Vec::new(), error: Some(error) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Message { topic: String, payload: Bytes },
    SubscribeAck { filter: String, ack: SubscribeAck },
    Reconnecting,
    Disconnected,
    Error(String),
}

pub(crate) type Stamped = (u64, TransportEvent);

/// Sending half handed to a transport on `open`. Cloneable, cheap.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<Stamped>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Stamped>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the session is gone; the transport should stop.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

pub trait Transport: Send + 'static {
    type Link: TransportLink;

    /// Starts connecting. Must not block; progress arrives through `events`.
    fn open(&mut self, options: TransportOptions, events: EventSink) -> Result<Self::Link, ConnectionError>;
}

/// Exclusive handle on one open connection.
pub trait TransportLink: Send + 'static {
    /// Queues a subscribe. The answer arrives later as [`TransportEvent::SubscribeAck`].
    fn subscribe(&mut self, filter: &str, qos: QosLevel) -> Result<(), ConnectionError>;
    fn publish(&mut self, topic: &str, payload: Bytes, qos: QosLevel) -> Result<(), ConnectionError>;
    fn close(self);
}
