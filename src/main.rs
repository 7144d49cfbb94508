use std::sync::Arc;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use termqtt::app::AppState;
use termqtt::config::Config;
use termqtt::session::MqttTransport;
use termqtt::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use termqtt::TermqttEngine;

// ========================================
// MAIN ENTRY POINT
// ========================================

#[tokio::main]
async fn main() {
    let config = Config::global();

    let filter = EnvFilter::try_new(&config.app.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match JsonFileStore::from_config(&config.app) {
        Some(store) => {
            info!("Settings directory: {}", store.dir().display());
            run(Arc::new(store), config).await;
        }
        None => {
            warn!("No home directory found, settings will not be saved");
            run(Arc::new(MemoryStore::new()), config).await;
        }
    }
}

async fn run<S: KeyValueStore>(store: Arc<S>, config: &Config) {
    let transport = MqttTransport::new(config.session.channel_capacity);
    let engine = TermqttEngine::start(transport, store, config);
    let mut updates = engine.subscribe();
    let mut last = engine.snapshot();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                log_changes(&last, &state);
                last = state;
            }
        }
    }

    engine.disconnect();
}

fn log_changes(before: &AppState, after: &AppState) {
    if before.status != after.status {
        match after.connection_error() {
            Some(error) => warn!("{} {}: {}", after.status, after.broker.url(), error),
            None => info!("{} {}", after.status, after.broker.url()),
        }
    }
    if before.subscription_info != after.subscription_info {
        if let (Some(label), Some(info)) = (&after.last_subscription, &after.subscription_info) {
            info!("[{}] {}", label, info);
        }
    }
    if after.topics.len() > before.topics.len() {
        for topic in after.topics.iter().filter(|t| before.topics.binary_search(t).is_err()) {
            info!("New topic: {}", topic);
        }
    }
    if after.message_count != before.message_count {
        if let Some(topic) = &after.last_message_topic {
            debug!("#{} {}", after.message_count, topic);
        }
    }
}
