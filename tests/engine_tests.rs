use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use termqtt::app::{selectors, Action, AppState, Favourite};
use termqtt::config::{AppConfig, Config, SessionConfig};
use termqtt::error::ValidationError;
use termqtt::payload::TableRow;
use termqtt::session::{BrokerConfig, ConnectionStatus, FixedClientId, SubscribeAck, TransportEvent};
use termqtt::storage::{broker_prefix, scoped_key, KeyValueStore, MemoryStore, FAVOURITES_FILE};
use termqtt::TermqttEngine;

mod helpers;
use helpers::{eventually, FakeTransport, WAIT};

fn test_config() -> Config {
    Config {
        broker: BrokerConfig { topic_filter: "#".into(), ..BrokerConfig::default() },
        session: SessionConfig::default(),
        app: AppConfig { log_level: "info".into(), config_dir: None },
    }
}

fn start(store: Arc<MemoryStore>) -> (TermqttEngine, FakeTransport) {
    let transport = FakeTransport::default();
    let engine = TermqttEngine::start_with_ids(
        transport.clone(),
        store,
        &test_config(),
        Arc::new(FixedClientId("engine-test".into())),
    );
    (engine, transport)
}

async fn wait_state<F>(engine: &TermqttEngine, mut cond: F) -> Arc<AppState>
where
    F: FnMut(&AppState) -> bool,
{
    let mut updates = engine.subscribe();
    let result = tokio::time::timeout(WAIT, async {
        loop {
            let state = updates.borrow_and_update().clone();
            if cond(&state) {
                return state;
            }
            if updates.changed().await.is_err() {
                panic!("orchestrator stopped");
            }
        }
    })
    .await;
    result.expect("state condition not met in time")
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    // =========================================================================================
    // 1. SESSION -> STATE
    // =========================================================================================

    mod flow {
        use super::*;

        #[tokio::test]
        async fn test_messages_build_topic_tree() {
            let (engine, transport) = start(Arc::new(MemoryStore::new()));
            eventually(|| transport.open_count() == 1).await;

            transport.emit(0, TransportEvent::Connected);
            eventually(|| transport.subscribed_on(0).len() == 1).await;
            transport.ack(0, "#", SubscribeAck::granted("#", 0));

            for (topic, payload) in [("home/kitchen/temp", "{\"c\":21}"), ("home/hall/read", "1"), ("garage", "open")] {
                transport.emit(0, TransportEvent::Message { topic: topic.into(), payload: Bytes::from(payload) });
            }

            let state = wait_state(&engine, |s| s.message_count == 3 && s.subscription_info.is_some()).await;
            assert_eq!(state.status, ConnectionStatus::Connected);
            assert_eq!(state.subscription_info.as_deref(), Some("granted:#:0"));
            assert_eq!(*state.topics, vec!["garage", "home/hall/read", "home/kitchen/temp"]);

            // "read" is excluded by default
            let paths: Vec<String> = selectors::topic_tree_entries(&state).into_iter().map(|e| e.path).collect();
            assert_eq!(paths, vec!["garage", "home", "home/kitchen"]);
            assert_eq!(
                selectors::first_leaf_topic_path(&state, "home").as_deref(),
                Some("home/kitchen/temp")
            );
        }

        #[tokio::test]
        async fn test_paused_updates_drop_messages() {
            let (engine, transport) = start(Arc::new(MemoryStore::new()));
            eventually(|| transport.open_count() == 1).await;

            engine.dispatch(Action::SetPaused(true));
            wait_state(&engine, |s| s.updates_paused).await;
            transport.emit(0, TransportEvent::Message { topic: "a".into(), payload: Bytes::from("1") });
            engine.dispatch(Action::SetSearch("x".into()));

            let state = wait_state(&engine, |s| s.search_query == "x").await;
            assert_eq!(state.message_count, 0);
            assert!(state.topics.is_empty());
        }
    }

    // =========================================================================================
    // 2. PUBLISH
    // =========================================================================================

    mod publish {
        use super::*;

        #[tokio::test]
        async fn test_publish_validation() {
            let (engine, transport) = start(Arc::new(MemoryStore::new()));
            assert_eq!(engine.publish("  ", "x"), Err(ValidationError::EmptyTopic));
            assert!(matches!(engine.publish("a/#", "x"), Err(ValidationError::WildcardTopic(_))));

            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(transport.published().is_empty());
        }

        #[tokio::test]
        async fn test_publish_rows_sends_rebuilt_payload() {
            let (engine, transport) = start(Arc::new(MemoryStore::new()));
            eventually(|| transport.open_count() == 1).await;

            let rows = vec![TableRow::new("a.b", "1"), TableRow::new("a.c", "\"x\"")];
            engine.publish_rows("out/topic", &rows, false).unwrap();

            eventually(|| transport.published().len() == 1).await;
            let (topic, payload, _) = transport.published()[0].clone();
            assert_eq!(topic, "out/topic");
            assert_eq!(payload, Bytes::from("{\n  \"a\": {\n    \"b\": 1,\n    \"c\": \"x\"\n  }\n}"));
        }
    }

    // =========================================================================================
    // 3. VALIDATED EDITS
    // =========================================================================================

    mod validation {
        use super::*;

        #[tokio::test]
        async fn test_blank_exclude_pattern_is_rejected() {
            let (engine, _transport) = start(Arc::new(MemoryStore::new()));
            assert_eq!(engine.add_exclude_filter("   "), Err(ValidationError::EmptyFilterPattern));
            assert_eq!(engine.edit_exclude_filter(0, ""), Err(ValidationError::EmptyFilterPattern));

            engine.add_exclude_filter(" noise/# ").unwrap();
            let state = wait_state(&engine, |s| s.exclude_filters.len() == 4).await;
            assert_eq!(state.exclude_filters[3].pattern, "noise/#");

            engine.edit_exclude_filter(3, "chatter").unwrap();
            wait_state(&engine, |s| s.exclude_filters[3].pattern == "chatter").await;
        }

        #[tokio::test]
        async fn test_blank_broker_host_is_rejected() {
            let (engine, transport) = start(Arc::new(MemoryStore::new()));
            eventually(|| transport.open_count() == 1).await;

            let blank = BrokerConfig { host: " ".into(), ..BrokerConfig::default() };
            assert!(matches!(engine.set_broker(blank.clone()), Err(ValidationError::InvalidBrokerConfig(_))));

            // a raw dispatch is ignored by the orchestrator as well
            engine.dispatch(Action::SetBroker(blank));
            engine.dispatch(Action::SetSearch("marker".into()));
            let state = wait_state(&engine, |s| s.search_query == "marker").await;
            assert_eq!(state.broker.host, "localhost");
            assert_eq!(transport.open_count(), 1);
        }
    }

    // =========================================================================================
    // 4. PERSISTENCE + BROKER SWITCH
    // =========================================================================================

    mod persistence {
        use super::*;

        #[tokio::test]
        async fn test_favourites_are_saved_per_broker() {
            let store = Arc::new(MemoryStore::new());
            let (engine, _transport) = start(store.clone());

            engine.dispatch(Action::ToggleFavourite("home/kitchen".into()));
            wait_state(&engine, |s| s.favourites.len() == 1).await;

            let key = scoped_key(&broker_prefix("localhost", 1883), FAVOURITES_FILE);
            eventually(|| store.read(&key).is_some()).await;
            let saved: Vec<Favourite> = store.load(&key, Vec::new());
            assert_eq!(saved, vec![Favourite { topic: "home/kitchen".into(), alias: None }]);
        }

        #[tokio::test]
        async fn test_set_broker_reconnects_and_loads_scoped_settings() {
            let store = Arc::new(MemoryStore::new());
            let other = vec![Favourite { topic: "other/topic".into(), alias: Some("o".into()) }];
            store
                .save(&scoped_key(&broker_prefix("other.host", 1884), FAVOURITES_FILE), &other)
                .unwrap();

            let (engine, transport) = start(store.clone());
            eventually(|| transport.open_count() == 1).await;

            engine
                .set_broker(BrokerConfig { host: "other.host".into(), port: 1884, ..BrokerConfig::default() })
                .unwrap();

            let state = wait_state(&engine, |s| s.broker.host == "other.host").await;
            assert_eq!(state.favourites, other);
            eventually(|| transport.open_count() == 2).await;
            assert_eq!(transport.opened()[1].host, "other.host");
            assert_eq!(transport.closed_count(), 1);
        }

        #[tokio::test]
        async fn test_startup_restores_saved_broker() {
            let store = Arc::new(MemoryStore::new());
            store
                .save("termqtt_broker.json", &BrokerConfig { host: "saved.host".into(), ..BrokerConfig::default() })
                .unwrap();

            let (engine, transport) = start(store);
            assert_eq!(engine.snapshot().broker.host, "saved.host");
            eventually(|| transport.open_count() == 1).await;
            assert_eq!(transport.opened()[0].host, "saved.host");
            assert_eq!(transport.opened()[0].client_id, "engine-test");
        }
    }
}
