//! Auto-reconnect continuation shared by both roles.
//!
//! Each successful connect arms exactly one continuation on the close signal
//! of the new data connection. When that signal fires, the continuation
//! checks the [`ReconnectMode`] and only then hands control back to the role,
//! which re-enters the gate and compares epochs before touching anything.
//! There is no backoff and no retry cap: one attempt per unexpected close.

use crate::peer::close::CloseSignal;
use crate::peer::types::Epoch;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectMode {
    /// A close triggers a reconnect
    Enabled,
    /// Temporarily ignoring closes while a forced reconnect tears down
    Suspended,
    /// Torn down or never started
    Off,
}

#[derive(Debug, Clone)]
pub struct ReconnectLoop {
    mode: Arc<Mutex<ReconnectMode>>,
}

impl Default for ReconnectLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectLoop {
    pub fn new() -> Self {
        Self {
            mode: Arc::new(Mutex::new(ReconnectMode::Off)),
        }
    }

    pub fn mode(&self) -> ReconnectMode {
        *self.mode.lock()
    }

    pub fn is_enabled(&self) -> bool {
        self.mode() == ReconnectMode::Enabled
    }

    pub fn enable(&self) {
        *self.mode.lock() = ReconnectMode::Enabled;
    }

    pub fn disable(&self) {
        *self.mode.lock() = ReconnectMode::Off;
    }

    /// Ignore closes until the returned guard resumes or drops. Must be
    /// taken before the teardown that fires the old close signal.
    pub fn suspend(&self) -> Suspension {
        let previous = std::mem::replace(&mut *self.mode.lock(), ReconnectMode::Suspended);
        Suspension {
            mode: Arc::clone(&self.mode),
            previous,
            done: false,
        }
    }

    /// Run `on_close` once `signal` fires, unless auto-reconnect is not
    /// enabled at that moment.
    pub fn arm<F, Fut>(&self, signal: CloseSignal, on_close: F) -> JoinHandle<()>
    where
        F: FnOnce(Epoch) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mode = Arc::clone(&self.mode);
        let epoch = signal.epoch();
        debug!("auto-reconnect armed on epoch {}", epoch);
        tokio::spawn(async move {
            signal.closed().await;
            let current = *mode.lock();
            if current != ReconnectMode::Enabled {
                debug!("close of epoch {} ignored ({:?})", epoch, current);
                return;
            }
            on_close(epoch).await;
        })
    }
}

/// Held while auto-reconnect is suspended
#[derive(Debug)]
pub struct Suspension {
    mode: Arc<Mutex<ReconnectMode>>,
    previous: ReconnectMode,
    done: bool,
}

impl Suspension {
    /// Re-enable auto-reconnect once the replacement connection is up
    pub fn resume(mut self) {
        self.done = true;
        let mut mode = self.mode.lock();
        if *mode == ReconnectMode::Suspended {
            *mode = ReconnectMode::Enabled;
        }
    }
}

impl Drop for Suspension {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // a teardown while suspended wins over the restore
        let mut mode = self.mode.lock();
        if *mode == ReconnectMode::Suspended {
            *mode = self.previous;
        }
    }
}
