use crate::peer::close::CloseSignal;
use crate::peer::types::{Epoch, PeerId};
use crate::signaling::{DataChannel, DataLink, MediaChannel, MediaLink, SignalingClient};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Inbound connections and calls of one signaling registration, queued
/// until a `wait_*` operation takes them.
#[derive(Clone)]
pub struct Inbound {
    pub connections: Arc<AsyncMutex<mpsc::UnboundedReceiver<DataChannel>>>,
    pub calls: Arc<AsyncMutex<mpsc::UnboundedReceiver<MediaChannel>>>,
}

/// Everything one session owns. Exactly one per `SessionManager`.
#[derive(Default)]
pub struct SessionState {
    /// Local identity, kept across peer reconnects, cleared on full teardown
    pub id: Option<PeerId>,
    pub client: Option<Arc<dyn SignalingClient>>,
    pub router: Option<JoinHandle<()>>,
    pub inbound: Option<Inbound>,
    pub data: Option<Arc<dyn DataLink>>,
    pub media: Option<Arc<dyn MediaLink>>,
    /// Close signal of the most recently armed data connection
    pub close: Option<CloseSignal>,
    /// Number of data connections armed so far
    pub epoch: Epoch,
}

impl SessionState {
    /// Detach data and media links for closing outside the lock
    pub fn take_peer(&mut self) -> (Option<Arc<dyn DataLink>>, Option<Arc<dyn MediaLink>>) {
        (self.data.take(), self.media.take())
    }

    /// Detach the signaling registration for destruction outside the lock
    pub fn take_server(&mut self) -> Option<Arc<dyn SignalingClient>> {
        if let Some(router) = self.router.take() {
            router.abort();
        }
        self.inbound = None;
        self.client.take()
    }
}
