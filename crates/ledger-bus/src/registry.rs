//! # Bus Registry
//!
//! Named hubs, created on first use. Owned by the application and passed to
//! whatever needs a hub; there is no process-global instance.

use std::collections::HashMap;
use std::sync::Arc;

use ledger_types::Engine;
use parking_lot::Mutex;
use tracing::debug;

use crate::bus::MessageBus;

/// Name of the hub used when none is specified.
pub const DEFAULT_BUS: &str = "default";

#[derive(Default)]
pub struct BusRegistry {
    buses: Mutex<HashMap<String, Arc<MessageBus>>>,
}

impl BusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing hub named `name`, or a new one serving `engine`.
    ///
    /// `engine` is ignored when the hub already exists.
    pub fn get_or_create(&self, name: &str, engine: Arc<dyn Engine>) -> Arc<MessageBus> {
        let mut buses = self.buses.lock();
        Arc::clone(buses.entry(name.to_string()).or_insert_with(|| {
            debug!(bus = name, "Creating message bus");
            Arc::new(MessageBus::new(name, engine))
        }))
    }

    pub fn get(&self, name: &str) -> Option<Arc<MessageBus>> {
        self.buses.lock().get(name).cloned()
    }

    /// Shut down and forget a hub. Returns `false` if there was none.
    pub async fn dispose(&self, name: &str) -> bool {
        let bus = self.buses.lock().remove(name);
        match bus {
            Some(bus) => {
                bus.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Shut down and forget every hub.
    pub async fn dispose_all(&self) {
        let buses: Vec<_> = self.buses.lock().drain().map(|(_, bus)| bus).collect();
        for bus in buses {
            bus.shutdown().await;
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.buses.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
