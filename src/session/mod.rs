//! Broker Session: one logical connection to a broker.
//!
//! [`BrokerSession`] is a cheap, cloneable handle. Every call returns
//! immediately; the actor behind it owns the transport and reports back
//! through a [`SessionHandler`].

mod actor;
pub mod client_id;
pub mod mqtt_transport;
pub mod subscription;
pub mod transport;
pub mod types;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use actor::{SessionActor, SessionCommand};

pub use client_id::{ClientIdGenerator, FixedClientId, HostPidClientId};
pub use mqtt_transport::MqttTransport;
pub use subscription::{FilterOutcome, SubscriptionCycle, SubscriptionOutcome};
pub use transport::{
    AckError, EventSink, GrantedQos, SubscribeAck, Transport, TransportEvent, TransportLink, TransportOptions,
    SUBACK_FAILURE,
};
pub use types::{BrokerConfig, ConnectionStatus, QosLevel, SessionHandler, SessionUpdate};

#[derive(Debug, Clone)]
pub struct BrokerSession {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl BrokerSession {
    /// Spawns the session actor on the current runtime.
    pub fn spawn<T, H>(transport: T, handler: H, settings: SessionConfig) -> Self
    where
        T: Transport,
        H: SessionHandler,
    {
        Self::spawn_with_ids(transport, handler, settings, Arc::new(HostPidClientId))
    }

    pub fn spawn_with_ids<T, H>(
        transport: T,
        handler: H,
        settings: SessionConfig,
        client_ids: Arc<dyn ClientIdGenerator>,
    ) -> Self
    where
        T: Transport,
        H: SessionHandler,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = SessionActor::new(transport, handler, client_ids, settings, rx);
        tokio::spawn(actor.run());
        Self { tx }
    }

    pub fn connect(&self, config: BrokerConfig) {
        self.send(SessionCommand::Connect(config));
    }

    /// Replaces the running connection. Late events from the old one are discarded.
    pub fn update_config(&self, config: BrokerConfig) {
        self.send(SessionCommand::UpdateConfig(config));
    }

    pub fn disconnect(&self) {
        self.send(SessionCommand::Disconnect);
    }

    /// Silently dropped unless a connection is open.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Bytes>) {
        self.send(SessionCommand::Publish {
            topic: topic.into(),
            payload: payload.into(),
        });
    }

    fn send(&self, cmd: SessionCommand) {
        if self.tx.send(cmd).is_err() {
            tracing::debug!("Session actor is gone, command dropped");
        }
    }
}
