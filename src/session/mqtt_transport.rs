//! MQTT transport backed by `rumqttc`.
//!
//! `open` builds an `AsyncClient` and spawns a pump task that drives the
//! `EventLoop`, translating its notifications into [`TransportEvent`]s. The
//! event loop reconnects on the next poll after an error; the pump waits a
//! fixed interval in between.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS, SubscribeReasonCode};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ConnectionError;
use crate::session::transport::{
    AckError, EventSink, GrantedQos, SubscribeAck, Transport, TransportEvent, TransportLink, TransportOptions,
    SUBACK_FAILURE,
};
use crate::session::QosLevel;

impl QosLevel {
    fn to_rumqttc(self) -> QoS {
        match self {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

// ==========================================
// SUBSCRIBE BOOKKEEPING
// ==========================================

/// Pairs SUBSCRIBE packet ids with the filters that produced them.
///
/// `subscribe` queues the filter name; the pump moves it to `in_flight` when
/// the packet goes out and takes it back when the SubAck arrives. Requests
/// still queued when the link drops are discarded by the clean session, so a
/// reset forgets both sides.
#[derive(Debug, Default)]
struct SubscribeTracker {
    queued: VecDeque<String>,
    in_flight: HashMap<u16, String>,
}

impl SubscribeTracker {
    fn queue(&mut self, filter: &str) {
        self.queued.push_back(filter.to_string());
    }

    fn unqueue_last(&mut self) {
        self.queued.pop_back();
    }

    fn sent(&mut self, pkid: u16) {
        match self.queued.pop_front() {
            Some(filter) => {
                self.in_flight.insert(pkid, filter);
            }
            None => debug!("SUBSCRIBE {} sent with no queued filter", pkid),
        }
    }

    fn acked(&mut self, pkid: u16) -> Option<String> {
        self.in_flight.remove(&pkid)
    }

    fn reset(&mut self) {
        self.queued.clear();
        self.in_flight.clear();
    }
}

type SharedTracker = Arc<Mutex<SubscribeTracker>>;

#[derive(Debug, Clone)]
pub struct MqttTransport {
    capacity: usize,
}

impl MqttTransport {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new(1024)
    }
}

pub struct MqttLink {
    client: AsyncClient,
    tracker: SharedTracker,
    pump: JoinHandle<()>,
}

impl Transport for MqttTransport {
    type Link = MqttLink;

    fn open(&mut self, options: TransportOptions, events: EventSink) -> Result<MqttLink, ConnectionError> {
        if options.client_id.trim().is_empty() {
            return Err(ConnectionError::Transport("client id must not be empty".into()));
        }

        let mut mqtt = MqttOptions::new(options.client_id.trim(), options.host.clone(), options.port);
        mqtt.set_keep_alive(options.keepalive.max(Duration::from_secs(1)));
        mqtt.set_clean_session(true);
        if let Some(username) = options.username.clone() {
            mqtt.set_credentials(username, options.password.clone().unwrap_or_default());
        }
        if options.tls {
            mqtt.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        let (client, eventloop) = AsyncClient::new(mqtt, self.capacity);
        let tracker = SharedTracker::default();
        let pump = tokio::spawn(pump(eventloop, events, tracker.clone(), options.reconnect_period));

        Ok(MqttLink { client, tracker, pump })
    }
}

impl TransportLink for MqttLink {
    fn subscribe(&mut self, filter: &str, qos: QosLevel) -> Result<(), ConnectionError> {
        self.tracker.lock().queue(filter);
        self.client.try_subscribe(filter, qos.to_rumqttc()).map_err(|e| {
            self.tracker.lock().unqueue_last();
            ConnectionError::Transport(e.to_string())
        })
    }

    fn publish(&mut self, topic: &str, payload: Bytes, qos: QosLevel) -> Result<(), ConnectionError> {
        self.client
            .try_publish(topic, qos.to_rumqttc(), false, payload.to_vec())
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    fn close(self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect request not queued: {}", e);
        }
        self.pump.abort();
    }
}

// ==========================================
// EVENT PUMP
// ==========================================

async fn pump(mut eventloop: EventLoop, events: EventSink, tracker: SharedTracker, retry: Duration) {
    let mut connected = false;

    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                // the session subscribes again only after Connected
                tracker.lock().reset();
                connected = true;
                TransportEvent::Connected
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => TransportEvent::Message {
                topic: publish.topic,
                payload: publish.payload,
            },
            Ok(Event::Incoming(Incoming::SubAck(suback))) => {
                let Some(filter) = tracker.lock().acked(suback.pkid) else {
                    debug!("SubAck for unknown packet id {}", suback.pkid);
                    continue;
                };
                let ack = ack_from_codes(&filter, &suback.return_codes);
                TransportEvent::SubscribeAck { filter, ack }
            }
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => {
                tracker.lock().sent(pkid);
                continue;
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                connected = false;
                TransportEvent::Disconnected
            }
            Ok(_) => continue,
            Err(err) => {
                let detail = describe(&err);
                warn!("MQTT connection error: {}", detail);
                tracker.lock().reset();
                if !events.send(TransportEvent::Error(detail)) {
                    break;
                }
                if connected {
                    connected = false;
                    if !events.send(TransportEvent::Disconnected) {
                        break;
                    }
                }
                tokio::time::sleep(retry).await;
                TransportEvent::Reconnecting
            }
        };

        if !events.send(event) {
            break;
        }
    }
    debug!("MQTT pump for generation {} exiting", events.generation());
}

fn ack_from_codes(filter: &str, codes: &[SubscribeReasonCode]) -> SubscribeAck {
    let granted = codes
        .iter()
        .map(|code| GrantedQos {
            filter: filter.to_string(),
            qos: match code {
                SubscribeReasonCode::Success(qos) => *qos as u8,
                SubscribeReasonCode::Failure => SUBACK_FAILURE,
            },
        })
        .collect::<Vec<_>>();

    if granted.is_empty() {
        return SubscribeAck::failed(AckError::new("empty subscribe acknowledgement"));
    }
    SubscribeAck { granted, error: None }
}

fn describe(err: &rumqttc::ConnectionError) -> String {
    match err {
        rumqttc::ConnectionError::Io(io) => format!("{} ({:?})", io, io.kind()),
        rumqttc::ConnectionError::ConnectionRefused(code) => format!("connection refused: {:?}", code),
        other => other.to_string(),
    }
}
