pub mod app;
pub mod config;
pub mod error;
pub mod payload;
pub mod session;
pub mod storage;
pub mod topics;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::app::{reduce, validate_publish_topic, Action, ActionSink, AppState, Orchestrator, PersistedState};
use crate::config::Config;
use crate::error::ValidationError;
use crate::payload::{rebuild_from_rows, TableRow};
use crate::session::{BrokerConfig, BrokerSession, ClientIdGenerator, HostPidClientId, Transport};
use crate::storage::{load_all, KeyValueStore};
use crate::topics::validate_filter_pattern;

// ========================================
// ENGINE
// ========================================

/// Composition root: storage, orchestrator and broker session wired together.
/// Cheap to clone; every clone talks to the same tasks.
#[derive(Clone)]
pub struct TermqttEngine {
    actions: mpsc::UnboundedSender<Action>,
    session: BrokerSession,
    snapshots: watch::Receiver<Arc<AppState>>,
}

impl TermqttEngine {
    /// Loads persisted settings, spawns the session and orchestrator, and
    /// starts connecting. Must be called inside a tokio runtime.
    pub fn start<T, S>(transport: T, store: Arc<S>, config: &Config) -> Self
    where
        T: Transport,
        S: KeyValueStore,
    {
        Self::start_with_ids(transport, store, config, Arc::new(HostPidClientId))
    }

    pub fn start_with_ids<T, S>(
        transport: T,
        store: Arc<S>,
        config: &Config,
        client_ids: Arc<dyn ClientIdGenerator>,
    ) -> Self
    where
        T: Transport,
        S: KeyValueStore,
    {
        let fallback = PersistedState { broker: config.broker.clone(), ..PersistedState::default() };
        let persisted = load_all(store.as_ref(), fallback);
        let state = reduce(AppState::default(), Action::Hydrate(persisted));

        let (actions, rx) = mpsc::unbounded_channel();
        let session = BrokerSession::spawn_with_ids(
            transport,
            ActionSink(actions.clone()),
            config.session.clone(),
            client_ids,
        );
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(state.clone()));

        session.connect(state.broker.clone());
        tokio::spawn(Orchestrator::new(state, store, session.clone(), rx, snapshot_tx).run());

        Self { actions, session, snapshots }
    }

    pub fn dispatch(&self, action: Action) {
        if self.actions.send(action).is_err() {
            tracing::debug!("Orchestrator is gone, action dropped");
        }
    }

    /// Validates the config before it replaces the current broker.
    pub fn set_broker(&self, broker: BrokerConfig) -> Result<(), ValidationError> {
        broker.validate()?;
        self.dispatch(Action::SetBroker(broker));
        Ok(())
    }

    pub fn add_exclude_filter(&self, pattern: &str) -> Result<(), ValidationError> {
        let pattern = validate_filter_pattern(pattern)?;
        self.dispatch(Action::AddExcludeFilter(pattern.to_string()));
        Ok(())
    }

    pub fn edit_exclude_filter(&self, index: usize, pattern: &str) -> Result<(), ValidationError> {
        let pattern = validate_filter_pattern(pattern)?;
        self.dispatch(Action::EditExcludeFilter { index, pattern: pattern.to_string() });
        Ok(())
    }

    /// Validates the topic, then hands the payload to the session. Nothing is
    /// sent while disconnected.
    pub fn publish(&self, topic: &str, payload: impl Into<String>) -> Result<(), ValidationError> {
        let topic = validate_publish_topic(topic)?;
        let payload: String = payload.into();
        self.session.publish(topic.to_string(), payload);
        Ok(())
    }

    /// Rebuilds the payload from editor rows and publishes it.
    pub fn publish_rows(&self, topic: &str, rows: &[TableRow], raw_mode: bool) -> Result<(), ValidationError> {
        let payload = rebuild_from_rows(rows, raw_mode);
        self.publish(topic, payload.to_text())
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.snapshots.clone()
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }
}
