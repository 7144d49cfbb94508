//! Key/value persistence for the operator's settings.
//!
//! Values are pretty-printed JSON documents addressed by file name. The broker
//! config is global; favourites, watchlist, saved messages and filters are
//! scoped to the broker they were collected on, with a fallback to the older
//! unscoped files.

pub mod writer;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::app::state::PersistedState;
use crate::config::AppConfig;
use crate::error::StorageError;

pub use writer::SettingsWriterHandle;

pub const CONFIG_DIR_NAME: &str = "termqtt";

pub const BROKER_FILE: &str = "termqtt_broker.json";
pub const FAVOURITES_FILE: &str = "termqtt_favourites.json";
pub const WATCHLIST_FILE: &str = "termqtt_watchlist.json";
pub const SAVED_MESSAGES_FILE: &str = "termqtt_saved_messages.json";
pub const FILTERS_FILE: &str = "termqtt_filters.json";

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("sanitize pattern is valid"));

// ==========================================
// STORE
// ==========================================

pub trait KeyValueStore: Send + Sync + 'static {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError>;

    /// Missing or undecodable entries yield `fallback`.
    fn load<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let Some(text) = self.read(key) else {
            return fallback;
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring unreadable '{}': {}", key, e);
                fallback
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(value)?;
        self.write(key, &text)
    }
}

/// One JSON file per key inside a config directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `TERMQTT_CONFIG_DIR`, else `$XDG_CONFIG_HOME/termqtt`, else `~/.config/termqtt`.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        Self::resolve_dir(config.config_dir.as_deref(), std::env::var("XDG_CONFIG_HOME").ok().as_deref())
            .map(Self::new)
    }

    fn resolve_dir(override_dir: Option<&str>, xdg: Option<&str>) -> Option<PathBuf> {
        if let Some(dir) = override_dir.filter(|d| !d.trim().is_empty()) {
            return Some(PathBuf::from(dir));
        }
        if let Some(xdg) = xdg.filter(|d| !d.trim().is_empty()) {
            return Some(Path::new(xdg).join(CONFIG_DIR_NAME));
        }
        dirs::home_dir().map(|home| home.join(".config").join(CONFIG_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Option<String> {
        let path = self.dir.join(key);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("No stored value at {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(key), contents)?;
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

// ==========================================
// BROKER-SCOPED KEYS
// ==========================================

pub fn sanitize_key(value: &str) -> String {
    NON_ALNUM.replace_all(value, "_").trim_matches('_').to_string()
}

pub fn broker_prefix(host: &str, port: u16) -> String {
    let host = if host.is_empty() { "unknown" } else { host };
    format!("broker_{}_{}_", sanitize_key(host), port)
}

pub fn scoped_key(prefix: &str, file: &str) -> String {
    format!("{}{}", prefix, file)
}

fn load_scoped_value<S: KeyValueStore, T: DeserializeOwned>(store: &S, prefix: &str, file: &str, fallback: T) -> T {
    let legacy = store.load(file, fallback);
    store.load(&scoped_key(prefix, file), legacy)
}

/// Loads the broker config, then every slice scoped to that broker.
pub fn load_all<S: KeyValueStore>(store: &S, fallback: PersistedState) -> PersistedState {
    let broker = store.load(BROKER_FILE, fallback.broker.clone());
    let (host, port) = (broker.host.clone(), broker.port);
    load_scoped(store, PersistedState { broker, ..fallback }, &host, port)
}

/// Reloads the broker-scoped slices for `host:port`, keeping `fallback.broker`.
pub fn load_scoped<S: KeyValueStore>(store: &S, fallback: PersistedState, host: &str, port: u16) -> PersistedState {
    let prefix = broker_prefix(host, port);
    PersistedState {
        favourites: load_scoped_value(store, &prefix, FAVOURITES_FILE, fallback.favourites),
        watchlist: load_scoped_value(store, &prefix, WATCHLIST_FILE, fallback.watchlist),
        saved_messages: load_scoped_value(store, &prefix, SAVED_MESSAGES_FILE, fallback.saved_messages),
        exclude_filters: load_scoped_value(store, &prefix, FILTERS_FILE, fallback.exclude_filters),
        broker: fallback.broker,
    }
}

pub fn save_all<S: KeyValueStore>(store: &S, data: &PersistedState) -> Result<(), StorageError> {
    let prefix = broker_prefix(&data.broker.host, data.broker.port);
    store.save(BROKER_FILE, &data.broker)?;
    store.save(&scoped_key(&prefix, FAVOURITES_FILE), &data.favourites)?;
    store.save(&scoped_key(&prefix, WATCHLIST_FILE), &data.watchlist)?;
    store.save(&scoped_key(&prefix, SAVED_MESSAGES_FILE), &data.saved_messages)?;
    store.save(&scoped_key(&prefix, FILTERS_FILE), &data.exclude_filters)?;
    Ok(())
}
