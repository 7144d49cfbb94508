use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use crate::session::{BrokerConfig, QosLevel};

static CONFIG: OnceLock<Config> = OnceLock::new();

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub session: SessionConfig,
    pub app: AppConfig,
}

impl Config {
    pub fn global() -> &'static Config {
        CONFIG.get_or_init(Self::load)
    }

    fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_env()
    }

    /// Reads the environment without touching `.env` or the global cache.
    pub fn from_env() -> Self {
        Self {
            broker: load_broker(),
            session: SessionConfig::load(),
            app: AppConfig::load(),
        }
    }
}

// --- MODULES ---

// BROKER
fn load_broker() -> BrokerConfig {
    let root_topic: String = get_env("TERMQTT_ROOT_TOPIC", "");
    let root_topic = root_topic.trim().to_string();
    let qos: u8 = get_env("TERMQTT_QOS", "0");

    BrokerConfig {
        host:                 get_env("TERMQTT_BROKER", "localhost"),
        port:                 get_env("TERMQTT_PORT", "1883"),
        client_id:            get_env("TERMQTT_CLIENT_ID", "termqtt"),
        username:             get_env("TERMQTT_USER", ""),
        password:             get_env("TERMQTT_PASSWORD", ""),
        tls:                  get_env("TERMQTT_TLS", "false"),
        qos:                  QosLevel::from_u8(qos).unwrap_or_default(),
        topic_filter:         if root_topic.is_empty() { "#".to_string() } else { root_topic.clone() },
        extra_topic_filters:  split_list(&get_env::<String>("TERMQTT_EXTRA_TOPICS", "")),
        default_publish_topic: root_topic,
    }
}

// SESSION
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub keepalive_secs: u64,
    pub reconnect_ms: u64,
    pub channel_capacity: usize,
    /// 0 disables the subscription acknowledgement timeout.
    pub suback_timeout_ms: u64,
}

impl SessionConfig {
    fn load() -> Self {
        Self {
            keepalive_secs:    get_env("SESSION_KEEPALIVE_SECS", "30"),
            reconnect_ms:      get_env("SESSION_RECONNECT_MS", "1000"),
            channel_capacity:  get_env("SESSION_CHAN_CAP", "1024"),
            suback_timeout_ms: get_env("SESSION_SUBACK_TIMEOUT_MS", "0"),
        }
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn reconnect_period(&self) -> Duration {
        Duration::from_millis(self.reconnect_ms)
    }

    pub fn suback_timeout(&self) -> Option<Duration> {
        (self.suback_timeout_ms > 0).then(|| Duration::from_millis(self.suback_timeout_ms))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            reconnect_ms: 1000,
            channel_capacity: 1024,
            suback_timeout_ms: 0,
        }
    }
}

// APP
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub config_dir: Option<String>,
}

impl AppConfig {
    fn load() -> Self {
        let config_dir: String = get_env("TERMQTT_CONFIG_DIR", "");
        Self {
            log_level:  get_env("TERMQTT_LOG", "info"),
            config_dir: (!config_dir.trim().is_empty()).then_some(config_dir),
        }
    }
}

// --- PRIVATE HELPERS ---

fn get_env<T: std::str::FromStr>(key: &str, default: &str) -> T {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Config error: {} must be valid, got '{}', using '{}'", key, raw, default);
            default
                .parse()
                .unwrap_or_else(|_| panic!("Config default for {} must parse", key))
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
