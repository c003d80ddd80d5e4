use crate::error::{Error, Result};
use crate::peer::close::{close_signal, CloseSignal};
use crate::peer::events::EventBus;
use crate::peer::types::{Epoch, PeerId};
use crate::signaling::{DataChannel, DataEvent, MediaEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A data connection that has been armed but may not be open yet
#[derive(Debug)]
pub struct Opening {
    remote: PeerId,
    opened: oneshot::Receiver<Result<()>>,
}

impl Opening {
    /// Resolve when the channel reports open. No deadline.
    pub async fn wait(self) -> Result<()> {
        match self.opened.await {
            Ok(result) => result,
            Err(_) => Err(Error::PeerConnect(format!(
                "connection to {} ended before opening",
                self.remote
            ))),
        }
    }
}

/// Take ownership of one data channel instance: mint its close signal and
/// pump its events for the lifetime of the connection.
pub fn attach_dc(channel: DataChannel, epoch: Epoch, bus: EventBus) -> (CloseSignal, Opening) {
    let (trigger, signal) = close_signal(epoch);
    let (open_tx, open_rx) = oneshot::channel();
    let remote = channel.link.remote().clone();
    let mut events = channel.events;

    let peer = remote.clone();
    tokio::spawn(async move {
        let mut open_tx = Some(open_tx);
        while let Some(event) = events.recv().await {
            match event {
                DataEvent::Open => {
                    info!("connected to {} (epoch {})", peer, epoch);
                    if let Some(tx) = open_tx.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                DataEvent::Data(payload) => {
                    bus.dispatch(&payload);
                }
                DataEvent::Close => {
                    info!("disconnected from {} (epoch {})", peer, epoch);
                    break;
                }
                DataEvent::Error(err) => {
                    warn!("data channel to {} failed: {}", peer, err);
                    if let Some(tx) = open_tx.take() {
                        let _ = tx.send(Err(Error::PeerConnect(err)));
                        // never opened, so nothing else will arrive
                        break;
                    }
                }
            }
        }
        trigger.fire();
    });

    let opening = Opening {
        remote,
        opened: open_rx,
    };
    (signal, opening)
}

/// Log what is left of a media channel once its outcome has been handled
pub fn drain_media(remote: PeerId, mut events: mpsc::UnboundedReceiver<MediaEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                MediaEvent::Stream(stream) => {
                    debug!("{} sent stream {}", remote, stream.id());
                }
                MediaEvent::Error(err) => warn!("media connection to {} failed: {}", remote, err),
                MediaEvent::Close => {
                    debug!("media connection to {} closed", remote);
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::memory::MemorySignalingServer;
    use crate::signaling::Signaling;
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_dial_rejects_and_closes() {
        let server = MemorySignalingServer::new();
        let (client, _events) = server.open(&PeerId::from_remote("RemoteDesktop000001"));
        let channel = client.connect(&PeerId::from_remote("RemoteDesktop424242"));

        let (signal, opening) = attach_dc(channel, 1, EventBus::new());
        assert!(matches!(opening.wait().await, Err(Error::PeerConnect(_))));
        tokio::time::timeout(Duration::from_secs(1), signal.closed())
            .await
            .unwrap();
    }
}
