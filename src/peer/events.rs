use crate::peer::types::DataPayload;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

pub type EventHandler = Arc<dyn Fn(&DataPayload) + Send + Sync>;

/// Application listeners for data-channel payloads, keyed by `type`.
/// Survives reconnects; only channel-level handlers are per epoch.
#[derive(Default, Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, kind: impl Into<String>, handler: EventHandler) {
        self.handlers
            .write()
            .entry(kind.into())
            .or_default()
            .push(handler);
    }

    /// Clear one type's listeners, or every listener with `None`
    pub fn remove_all(&self, kind: Option<&str>) {
        let mut handlers = self.handlers.write();
        match kind {
            Some(kind) => {
                handlers.remove(kind);
            }
            None => handlers.clear(),
        }
    }

    /// Run the listeners registered for the payload's `type`.
    /// Payloads without a string `type` are dropped.
    pub fn dispatch(&self, payload: &DataPayload) -> usize {
        let Some(kind) = payload.get("type").and_then(|t| t.as_str()) else {
            trace!("dropping untyped payload");
            return 0;
        };
        // clone out so handlers may register listeners themselves
        let handlers = self.handlers.read().get(kind).cloned().unwrap_or_default();
        debug!("dispatching '{}' to {} handler(s)", kind, handlers.len());
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }
}
