//! Orchestrator: the single task that owns [`AppState`].
//!
//! Session callbacks and caller requests arrive as [`Action`]s on one channel
//! and are folded through [`reduce`] in arrival order. After each action the
//! new state is published on a watch channel, changed persisted slices are
//! written back to storage, and broker changes are forwarded to the session.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::app::reducer::{reduce, Action};
use crate::app::state::{AppState, PersistedState};
use crate::error::ValidationError;
use crate::session::{BrokerConfig, BrokerSession, ConnectionStatus, SessionHandler};
use crate::storage::{load_scoped, KeyValueStore, SettingsWriterHandle};

/// Turns session callbacks into actions on the orchestrator channel.
#[derive(Debug, Clone)]
pub struct ActionSink(pub mpsc::UnboundedSender<Action>);

impl SessionHandler for ActionSink {
    fn on_status(&self, status: ConnectionStatus) {
        let _ = self.0.send(Action::Status(status));
    }

    fn on_message(&self, topic: String, payload: String) {
        let _ = self.0.send(Action::Message { topic, payload, received_at: Utc::now() });
    }

    fn on_subscription(&self, filter_label: String, summary: String) {
        let _ = self.0.send(Action::Subscription { filter_label, summary });
    }
}

const WILDCARD_SINGLE_CHAR: char = '+';
const WILDCARD_MULTI_CHAR: char = '#';

/// Rejects topics the broker would refuse to publish on.
pub fn validate_publish_topic(topic: &str) -> Result<&str, ValidationError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    if topic.contains([WILDCARD_SINGLE_CHAR, WILDCARD_MULTI_CHAR]) {
        return Err(ValidationError::WildcardTopic(topic.to_string()));
    }
    Ok(topic)
}

pub struct Orchestrator<S: KeyValueStore> {
    state: AppState,
    store: Arc<S>,
    writer: SettingsWriterHandle,
    session: BrokerSession,
    rx: mpsc::UnboundedReceiver<Action>,
    snapshots: watch::Sender<Arc<AppState>>,
}

impl<S: KeyValueStore> Orchestrator<S> {
    /// Must be called inside a tokio runtime; spawns the settings writer.
    pub fn new(
        state: AppState,
        store: Arc<S>,
        session: BrokerSession,
        rx: mpsc::UnboundedReceiver<Action>,
        snapshots: watch::Sender<Arc<AppState>>,
    ) -> Self {
        let writer = SettingsWriterHandle::spawn(store.clone());
        Self { state, store, writer, session, rx, snapshots }
    }

    pub async fn run(mut self) {
        while let Some(action) = self.rx.recv().await {
            self.apply(action);
        }
        debug!("Orchestrator channel closed, exiting");
    }

    fn apply(&mut self, action: Action) {
        if let Action::SetBroker(broker) = &action {
            if let Err(e) = broker.validate() {
                warn!("Ignoring broker change: {}", e);
                return;
            }
        }

        let persist = action.touches_persisted();
        let previous = self.state.broker.clone();

        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);

        if self.state.broker != previous {
            self.switch_broker(&previous);
        }
        if persist {
            self.writer.save(self.state.persisted());
        }
        self.snapshots.send_replace(Arc::new(self.state.clone()));
    }

    fn switch_broker(&mut self, previous: &BrokerConfig) {
        let broker = self.state.broker.clone();
        if (broker.host.as_str(), broker.port) != (previous.host.as_str(), previous.port) {
            info!("Broker changed to {}, loading its saved settings", broker.url());
            let fallback = PersistedState { broker: broker.clone(), ..PersistedState::default() };
            let scoped = load_scoped(self.store.as_ref(), fallback, &broker.host, broker.port);
            let state = std::mem::take(&mut self.state);
            self.state = reduce(state, Action::Hydrate(scoped));
        }
        self.session.update_config(broker);
    }
}
