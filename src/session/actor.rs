//! Session Actor: owns the transport link and linearizes every state transition.
//!
//! Commands from the handle and events from the transport are processed by one
//! task. Each `connect`/`update_config`/`disconnect` bumps the generation, and
//! events stamped with an older generation are dropped on arrival.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::session::client_id::ClientIdGenerator;
use crate::session::subscription::{SubscriptionCycle, SubscriptionOutcome};
use crate::session::transport::{
    AckError, EventSink, Stamped, SubscribeAck, Transport, TransportEvent, TransportLink, TransportOptions,
};
use crate::session::types::{BrokerConfig, ConnectionStatus, SessionHandler};

// ==========================================
// ACTOR COMMANDS
// ==========================================

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Connect(BrokerConfig),
    UpdateConfig(BrokerConfig),
    Disconnect,
    Publish { topic: String, payload: Bytes },
}

// ==========================================
// SESSION ACTOR
// ==========================================

pub(crate) struct SessionActor<T: Transport, H: SessionHandler> {
    transport: T,
    handler: H,
    client_ids: Arc<dyn ClientIdGenerator>,
    settings: SessionConfig,
    rx: mpsc::UnboundedReceiver<SessionCommand>,
    events_tx: mpsc::UnboundedSender<Stamped>,
    events_rx: mpsc::UnboundedReceiver<Stamped>,
    generation: u64,
    config: Option<BrokerConfig>,
    link: Option<T::Link>,
    cycle: Option<SubscriptionCycle>,
    cycle_deadline: Option<Instant>,
}

impl<T: Transport, H: SessionHandler> SessionActor<T, H> {
    pub(crate) fn new(
        transport: T,
        handler: H,
        client_ids: Arc<dyn ClientIdGenerator>,
        settings: SessionConfig,
        rx: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            handler,
            client_ids,
            settings,
            rx,
            events_tx,
            events_rx,
            generation: 0,
            config: None,
            link: None,
            cycle: None,
            cycle_deadline: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => break,
                    }
                }
                Some((generation, event)) = self.events_rx.recv() => {
                    self.handle_event(generation, event);
                }
                _ = wait_until(self.cycle_deadline) => {
                    self.expire_cycle();
                }
            }
        }
        self.close_link();
        debug!("Session actor channel closed, exiting");
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect(config) => {
                self.close_link();
                self.open(config);
            }
            SessionCommand::UpdateConfig(config) => {
                if self.close_link() {
                    self.handler.on_status(ConnectionStatus::Disconnected);
                }
                self.open(config);
            }
            SessionCommand::Disconnect => {
                if self.close_link() {
                    self.handler.on_status(ConnectionStatus::Disconnected);
                }
            }
            SessionCommand::Publish { topic, payload } => self.publish(&topic, payload),
        }
    }

    // --- CONNECT ---
    fn open(&mut self, config: BrokerConfig) {
        self.generation += 1;
        self.handler.on_status(ConnectionStatus::Connecting);

        if let Err(e) = config.validate() {
            warn!("Not connecting to {}: {}", config.url(), e);
            self.handler.on_status(ConnectionStatus::Error(e.to_string()));
            self.config = None;
            return;
        }

        let options = TransportOptions {
            host: config.host.clone(),
            port: config.port,
            tls: config.tls,
            client_id: self.client_ids.generate(&config.client_id),
            username: Some(config.username.clone()).filter(|u| !u.is_empty()),
            password: Some(config.password.clone()).filter(|p| !p.is_empty()),
            keepalive: self.settings.keepalive(),
            reconnect_period: self.settings.reconnect_period(),
        };
        info!("Connecting to {} as '{}' (generation {})", config.url(), options.client_id, self.generation);

        let sink = EventSink::new(self.generation, self.events_tx.clone());
        match self.transport.open(options, sink) {
            Ok(link) => self.link = Some(link),
            Err(e) => {
                warn!("Failed to open transport for {}: {}", config.url(), e);
                self.handler.on_status(ConnectionStatus::Error(e.to_string()));
            }
        }
        self.config = Some(config);
    }

    /// Drops the current link and invalidates everything tied to it.
    /// Returns whether a link was open.
    fn close_link(&mut self) -> bool {
        self.cycle = None;
        self.cycle_deadline = None;
        match self.link.take() {
            Some(link) => {
                self.generation += 1;
                link.close();
                true
            }
            None => false,
        }
    }

    // --- PUBLISH ---
    fn publish(&mut self, topic: &str, payload: Bytes) {
        let qos = self.config.as_ref().map(|c| c.qos).unwrap_or_default();
        let Some(link) = self.link.as_mut() else {
            debug!("Dropping publish to '{}': no open connection", topic);
            return;
        };
        if let Err(e) = link.publish(topic, payload, qos) {
            warn!("Publish to '{}' failed: {}", topic, e);
        }
    }

    // --- TRANSPORT EVENTS ---
    fn handle_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            debug!("Dropping stale event from generation {} (current {}): {:?}", generation, self.generation, event);
            return;
        }

        match event {
            TransportEvent::Connected => {
                self.handler.on_status(ConnectionStatus::Connected);
                self.start_cycle();
            }
            TransportEvent::Message { topic, payload } => {
                self.handler.on_message(topic, String::from_utf8_lossy(&payload).into_owned());
            }
            TransportEvent::SubscribeAck { filter, ack } => self.record_ack(&filter, ack),
            TransportEvent::Reconnecting => self.handler.on_status(ConnectionStatus::Connecting),
            TransportEvent::Disconnected => self.handler.on_status(ConnectionStatus::Disconnected),
            TransportEvent::Error(detail) => {
                warn!("Transport error: {}", detail);
                self.handler.on_status(ConnectionStatus::Error(detail));
            }
        }
    }

    // --- SUBSCRIPTION CYCLE ---
    fn start_cycle(&mut self) {
        let Some(config) = self.config.as_ref() else { return };
        let filters = config.active_filters();
        let qos = config.qos;

        self.cycle = Some(SubscriptionCycle::new(filters.clone()));
        self.cycle_deadline = self.settings.suback_timeout().map(|t| Instant::now() + t);

        for filter in filters {
            let result = match self.link.as_mut() {
                Some(link) => link.subscribe(&filter, qos),
                None => return,
            };
            if let Err(e) = result {
                self.record_ack(&filter, SubscribeAck::failed(AckError::new(e.to_string())));
            }
        }
    }

    fn record_ack(&mut self, filter: &str, ack: SubscribeAck) {
        let Some(cycle) = self.cycle.as_mut() else {
            debug!("Ignoring ack for '{}': no subscription cycle in progress", filter);
            return;
        };
        if let Some(outcome) = cycle.record(filter, ack) {
            self.finish_cycle(outcome);
        }
    }

    fn expire_cycle(&mut self) {
        self.cycle_deadline = None;
        if let Some(cycle) = self.cycle.take() {
            let outcome = cycle.expire();
            warn!("Subscription acknowledgement timed out for: {}", outcome.filter_label());
            self.finish_cycle(outcome);
        }
    }

    fn finish_cycle(&mut self, outcome: SubscriptionOutcome) {
        self.cycle = None;
        self.cycle_deadline = None;

        let summary = outcome.summary();
        for err in outcome.errors() {
            warn!("{}", err);
        }
        info!("Subscribed [{}]: {}", outcome.filter_label(), summary);
        self.handler.on_subscription(outcome.filter_label(), summary);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
