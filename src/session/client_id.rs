//! Client identifiers presented to the broker.

use uuid::Uuid;

const DEFAULT_BASE: &str = "termqtt";

pub trait ClientIdGenerator: Send + Sync + 'static {
    fn generate(&self, base: &str) -> String;
}

fn base_or_default(base: &str) -> &str {
    match base.trim() {
        "" => DEFAULT_BASE,
        trimmed => trimmed,
    }
}

/// `<base>-<hostname>-<pid>`, so two instances on one machine never collide.
/// Falls back to a random suffix when the hostname cannot be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPidClientId;

impl ClientIdGenerator for HostPidClientId {
    fn generate(&self, base: &str) -> String {
        let base = base_or_default(base);
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.trim().is_empty());

        match host {
            Some(host) => format!("{}-{}-{}", base, host, std::process::id()),
            None => {
                let suffix = Uuid::new_v4().simple().to_string();
                format!("{}-{}", base, &suffix[..8])
            }
        }
    }
}

/// Always hands out the same id.
#[derive(Debug, Clone)]
pub struct FixedClientId(pub String);

impl ClientIdGenerator for FixedClientId {
    fn generate(&self, _base: &str) -> String {
        self.0.clone()
    }
}
