//! Background writer for the persisted settings.
//!
//! The orchestrator hands over snapshots and moves on; the writer coalesces
//! whatever queued up meanwhile and writes the newest one on the blocking pool,
//! one save at a time so an older snapshot never lands after a newer one.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::app::state::PersistedState;
use crate::storage::{save_all, KeyValueStore};

// --- HANDLE ---

#[derive(Debug, Clone)]
pub struct SettingsWriterHandle {
    tx: mpsc::UnboundedSender<PersistedState>,
}

impl SettingsWriterHandle {
    /// Spawns the writer on the current runtime.
    pub fn spawn<S: KeyValueStore>(store: Arc<S>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(SettingsWriter { store, rx }.run());
        Self { tx }
    }

    pub fn save(&self, data: PersistedState) {
        if self.tx.send(data).is_err() {
            error!("Settings writer is gone, changes not saved");
        }
    }
}

// --- WRITER ---

struct SettingsWriter<S: KeyValueStore> {
    store: Arc<S>,
    rx: mpsc::UnboundedReceiver<PersistedState>,
}

impl<S: KeyValueStore> SettingsWriter<S> {
    async fn run(mut self) {
        while let Some(mut data) = self.rx.recv().await {
            let mut skipped = 0;
            while let Ok(newer) = self.rx.try_recv() {
                data = newer;
                skipped += 1;
            }
            if skipped > 0 {
                debug!("Coalesced {} settings snapshots", skipped);
            }

            let store = self.store.clone();
            match tokio::task::spawn_blocking(move || save_all(store.as_ref(), &data)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failed to persist settings: {}", e),
                Err(e) => error!("Settings write task failed: {}", e),
            }
        }
        debug!("Settings writer channel closed, exiting");
    }
}
