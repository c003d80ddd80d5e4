//! Single-holder async gate serializing lifecycle transitions.
//!
//! Waiters queue on a tokio mutex, which hands the lock over in FIFO order
//! without polling. The holder releases by dropping (or explicitly
//! releasing) its [`GateGuard`], which covers every exit path of a critical
//! section including `?` returns.
//!
//! The gate is not re-entrant: a holder that calls [`SerialGate::acquire`]
//! again waits for itself forever. There is no timeout.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SerialGate {
    held: Arc<Mutex<()>>,
}

/// Proof of holding the gate. Dropping it releases.
#[derive(Debug)]
pub struct GateGuard {
    _held: OwnedMutexGuard<()>,
}

impl GateGuard {
    /// Release before the end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        debug!("gate released");
    }
}

impl Default for SerialGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialGate {
    pub fn new() -> Self {
        Self {
            held: Arc::new(Mutex::new(())),
        }
    }

    /// Suspend until no other holder is active, then hold the gate
    pub async fn acquire(&self) -> GateGuard {
        let held = Arc::clone(&self.held).lock_owned().await;
        debug!("gate acquired");
        GateGuard { _held: held }
    }

    pub fn try_acquire(&self) -> Option<GateGuard> {
        Arc::clone(&self.held)
            .try_lock_owned()
            .ok()
            .map(|held| GateGuard { _held: held })
    }

    pub fn is_held(&self) -> bool {
        self.held.try_lock().is_err()
    }
}
