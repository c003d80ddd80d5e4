use crate::peer::state::Inbound;
use crate::peer::types::PeerId;
use crate::signaling::SignalingEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a registration: confirmed id or the server's error text
pub type Registered = std::result::Result<PeerId, String>;

/// Spawn the task that fans a registration's events out: the open/error
/// outcome to `connect_server`, inbound channels to the `wait_*` queues.
pub fn spawn_router(
    id: PeerId,
    mut events: mpsc::UnboundedReceiver<SignalingEvent>,
) -> (JoinHandle<()>, oneshot::Receiver<Registered>, Inbound) {
    let (open_tx, open_rx) = oneshot::channel();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    let (call_tx, call_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut open_tx = Some(open_tx);
        while let Some(event) = events.recv().await {
            match event {
                SignalingEvent::Open(confirmed) => {
                    info!("connected as {}", confirmed);
                    if let Some(tx) = open_tx.take() {
                        let _ = tx.send(Ok(confirmed));
                    }
                }
                SignalingEvent::Error(err) => {
                    error!("signaling error for {}: {}", id, err);
                    if let Some(tx) = open_tx.take() {
                        let _ = tx.send(Err(err));
                    }
                }
                SignalingEvent::Connection(channel) => {
                    debug!("{} dialed {}", channel.link.remote(), id);
                    if conn_tx.send(channel).is_err() {
                        warn!("inbound connection dropped, session is gone");
                    }
                }
                SignalingEvent::Call(channel) => {
                    debug!("{} is calling {}", channel.link.remote(), id);
                    if call_tx.send(channel).is_err() {
                        warn!("inbound call dropped, session is gone");
                    }
                }
                SignalingEvent::Disconnected => {
                    warn!("{} lost the signaling server", id);
                }
            }
        }
        debug!("signaling event stream for {} ended", id);
    });

    let inbound = Inbound {
        connections: Arc::new(AsyncMutex::new(conn_rx)),
        calls: Arc::new(AsyncMutex::new(call_rx)),
    };
    (handle, open_rx, inbound)
}
