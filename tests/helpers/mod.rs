#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;

use termqtt::config::SessionConfig;
use termqtt::error::ConnectionError;
use termqtt::session::{
    BrokerConfig, BrokerSession, EventSink, FixedClientId, QosLevel, SessionUpdate, SubscribeAck, Transport,
    TransportEvent, TransportLink, TransportOptions,
};
use termqtt::storage::JsonFileStore;

pub const WAIT: Duration = Duration::from_secs(2);

// ==========================================
// FAKE TRANSPORT
// ==========================================

#[derive(Default)]
pub struct FakeState {
    pub opened: Vec<TransportOptions>,
    pub sinks: Vec<EventSink>,
    pub subscribed: Vec<(u64, String, QosLevel)>,
    pub published: Vec<(String, Bytes, QosLevel)>,
    pub closed: Vec<u64>,
    pub fail_next_open: Option<ConnectionError>,
}

/// In-memory transport. Tests drive it by emitting events on the sink of a
/// given connection, and inspect what the session asked it to do.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeState>>,
}

pub struct FakeLink {
    generation: u64,
    inner: Arc<Mutex<FakeState>>,
}

impl Transport for FakeTransport {
    type Link = FakeLink;

    fn open(&mut self, options: TransportOptions, events: EventSink) -> Result<FakeLink, ConnectionError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.fail_next_open.take() {
            return Err(err);
        }
        let generation = events.generation();
        inner.opened.push(options);
        inner.sinks.push(events);
        Ok(FakeLink { generation, inner: self.inner.clone() })
    }
}

impl TransportLink for FakeLink {
    fn subscribe(&mut self, filter: &str, qos: QosLevel) -> Result<(), ConnectionError> {
        self.inner.lock().subscribed.push((self.generation, filter.to_string(), qos));
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: Bytes, qos: QosLevel) -> Result<(), ConnectionError> {
        self.inner.lock().published.push((topic.to_string(), payload, qos));
        Ok(())
    }

    fn close(self) {
        self.inner.lock().closed.push(self.generation);
    }
}

impl FakeTransport {
    pub fn fail_next_open(&self, err: ConnectionError) {
        self.inner.lock().fail_next_open = Some(err);
    }

    pub fn opened(&self) -> Vec<TransportOptions> {
        self.inner.lock().opened.clone()
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().sinks.len()
    }

    /// Filters subscribed on the `connection`-th opened link (0-based).
    pub fn subscribed_on(&self, connection: usize) -> Vec<String> {
        let inner = self.inner.lock();
        let Some(generation) = inner.sinks.get(connection).map(|s| s.generation()) else {
            return Vec::new();
        };
        inner
            .subscribed
            .iter()
            .filter(|(g, _, _)| *g == generation)
            .map(|(_, filter, _)| filter.clone())
            .collect()
    }

    pub fn published(&self) -> Vec<(String, Bytes, QosLevel)> {
        self.inner.lock().published.clone()
    }

    pub fn closed_count(&self) -> usize {
        self.inner.lock().closed.len()
    }

    /// Emits on the `connection`-th opened link.
    pub fn emit(&self, connection: usize, event: TransportEvent) {
        let sink = self.inner.lock().sinks[connection].clone();
        assert!(sink.send(event), "session should still be listening");
    }

    pub fn ack(&self, connection: usize, filter: &str, ack: SubscribeAck) {
        self.emit(connection, TransportEvent::SubscribeAck { filter: filter.to_string(), ack });
    }
}

// ==========================================
// SETUP
// ==========================================

pub fn broker_config(filters: &[&str]) -> BrokerConfig {
    let (primary, extras) = filters.split_first().map_or(("", &[][..]), |(p, rest)| (*p, rest));
    BrokerConfig {
        topic_filter: primary.to_string(),
        extra_topic_filters: extras.iter().map(|f| f.to_string()).collect(),
        ..BrokerConfig::default()
    }
}

pub fn setup_session(settings: SessionConfig) -> (BrokerSession, FakeTransport, mpsc::UnboundedReceiver<SessionUpdate>) {
    let transport = FakeTransport::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let session = BrokerSession::spawn_with_ids(
        transport.clone(),
        tx,
        settings,
        Arc::new(FixedClientId("test-client".into())),
    );
    (session, transport, rx)
}

pub fn setup_file_store() -> (JsonFileStore, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(temp_dir.path().join("termqtt"));
    (store, temp_dir)
}

// ==========================================
// WAITING
// ==========================================

pub async fn next_update(rx: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> SessionUpdate {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a session update")
        .expect("session channel closed")
}

/// Skips updates until one matches.
pub async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<SessionUpdate>, mut pred: F) -> SessionUpdate
where
    F: FnMut(&SessionUpdate) -> bool,
{
    loop {
        let update = next_update(rx).await;
        if pred(&update) {
            return update;
        }
    }
}

/// Collects whatever arrives within `window`.
pub async fn drain(rx: &mut mpsc::UnboundedReceiver<SessionUpdate>, window: Duration) -> Vec<SessionUpdate> {
    let mut updates = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(update)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        updates.push(update);
    }
    updates
}

pub async fn eventually<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
