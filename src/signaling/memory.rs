//! In-process signaling broker.
//!
//! Connects sessions living in the same process (two tabs of one shell, or
//! both roles inside a test) without a network. Ids are unique per broker,
//! dials to unknown ids fail on the channel, and closing either end of a
//! channel delivers `Close` to both ends.

use crate::error::{Error, Result};
use crate::media::{MediaStream, MediaTrack};
use crate::peer::types::{DataPayload, PeerId};
use crate::signaling::{
    DataChannel, DataEvent, DataLink, MediaChannel, MediaEvent, MediaLink, Signaling,
    SignalingClient, SignalingEvent, TrackSender,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
struct Hub {
    peers: Mutex<HashMap<PeerId, Arc<Registration>>>,
}

struct Registration {
    events: mpsc::UnboundedSender<SignalingEvent>,
    disconnected: AtomicBool,
    data_links: Mutex<Vec<Arc<MemoryDataLink>>>,
    media_links: Mutex<Vec<Arc<MemoryMediaLink>>>,
}

impl Registration {
    /// Remember a live link, forgetting the ones closed since
    fn track_data(&self, link: Arc<MemoryDataLink>) {
        let mut links = self.data_links.lock();
        links.retain(|l| !l.closed.load(Ordering::Acquire));
        links.push(link);
    }

    fn track_media(&self, link: Arc<MemoryMediaLink>) {
        let mut links = self.media_links.lock();
        links.retain(|l| !l.closed.load(Ordering::Acquire));
        links.push(link);
    }

    fn close_all(&self) {
        let data = std::mem::take(&mut *self.data_links.lock());
        for link in data {
            link.close();
        }
        let media = std::mem::take(&mut *self.media_links.lock());
        for link in media {
            link.close();
        }
    }
}

/// Broker shared by every session that should see each other
#[derive(Clone, Default)]
pub struct MemorySignalingServer {
    hub: Arc<Hub>,
}

impl MemorySignalingServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, id: &PeerId) -> bool {
        self.hub.peers.lock().contains_key(id)
    }

    /// Drop `id` from the server as if its socket died. Established channels
    /// stay up; the client sees [`SignalingEvent::Disconnected`].
    pub fn disconnect(&self, id: &PeerId) {
        if let Some(reg) = self.hub.peers.lock().remove(id) {
            reg.disconnected.store(true, Ordering::Release);
            let _ = reg.events.send(SignalingEvent::Disconnected);
        }
    }

    /// Close every channel `id` holds, as if the remote tab went away
    pub fn drop_channels(&self, id: &PeerId) {
        let reg = self.hub.peers.lock().get(id).cloned();
        if let Some(reg) = reg {
            reg.close_all();
        }
    }
}

impl Signaling for MemorySignalingServer {
    fn open(
        &self,
        id: &PeerId,
    ) -> (Arc<dyn SignalingClient>, mpsc::UnboundedReceiver<SignalingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reg = Arc::new(Registration {
            events: tx.clone(),
            disconnected: AtomicBool::new(true),
            data_links: Mutex::new(Vec::new()),
            media_links: Mutex::new(Vec::new()),
        });

        {
            let mut peers = self.hub.peers.lock();
            if peers.contains_key(id) {
                debug!("memory signaling: id {} is taken", id);
                let _ = tx.send(SignalingEvent::Error(format!("ID \"{}\" is taken", id)));
            } else {
                reg.disconnected.store(false, Ordering::Release);
                peers.insert(id.clone(), Arc::clone(&reg));
                let _ = tx.send(SignalingEvent::Open(id.clone()));
            }
        }

        let client = MemoryClient {
            id: id.clone(),
            hub: Arc::clone(&self.hub),
            reg,
        };
        (Arc::new(client), rx)
    }
}

struct MemoryClient {
    id: PeerId,
    hub: Arc<Hub>,
    reg: Arc<Registration>,
}

impl MemoryClient {
    fn lookup(&self, remote: &PeerId) -> Option<Arc<Registration>> {
        if self.is_disconnected() {
            return None;
        }
        self.hub.peers.lock().get(remote).cloned()
    }
}

#[async_trait]
impl SignalingClient for MemoryClient {
    fn id(&self) -> &PeerId {
        &self.id
    }

    fn connect(&self, remote: &PeerId) -> DataChannel {
        let (local_tx, local_rx) = mpsc::unbounded_channel();
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let local = Arc::new(MemoryDataLink {
            remote: remote.clone(),
            local_tx: local_tx.clone(),
            peer_tx: peer_tx.clone(),
            closed: Arc::clone(&closed),
        });

        let Some(target) = self.lookup(remote) else {
            closed.store(true, Ordering::Release);
            let _ = local_tx.send(DataEvent::Error(format!(
                "Could not connect to peer {}",
                remote
            )));
            return DataChannel {
                link: local,
                events: local_rx,
            };
        };

        let far = Arc::new(MemoryDataLink {
            remote: self.id.clone(),
            local_tx: peer_tx.clone(),
            peer_tx: local_tx.clone(),
            closed,
        });
        let inbound = DataChannel {
            link: far.clone(),
            events: peer_rx,
        };
        if target.events.send(SignalingEvent::Connection(inbound)).is_err() {
            local.closed.store(true, Ordering::Release);
            let _ = local_tx.send(DataEvent::Error(format!("Peer {} is unreachable", remote)));
            return DataChannel {
                link: local,
                events: local_rx,
            };
        }

        self.reg.track_data(Arc::clone(&local));
        target.track_data(far);
        let _ = local_tx.send(DataEvent::Open);
        let _ = peer_tx.send(DataEvent::Open);

        DataChannel {
            link: local,
            events: local_rx,
        }
    }

    async fn call(&self, remote: &PeerId, stream: &MediaStream) -> Result<MediaChannel> {
        let target = self
            .lookup(remote)
            .ok_or_else(|| Error::Call(format!("Could not call peer {}", remote)))?;

        let (local_tx, local_rx) = mpsc::unbounded_channel();
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let answered = Arc::new(AtomicBool::new(false));

        let local = Arc::new(MemoryMediaLink {
            remote: remote.clone(),
            local_tx: local_tx.clone(),
            peer_tx: peer_tx.clone(),
            closed: Arc::clone(&closed),
            answered: Arc::clone(&answered),
            offered: None,
            senders: Mutex::new(MemorySender::for_stream(stream)),
        });
        let far = Arc::new(MemoryMediaLink {
            remote: self.id.clone(),
            local_tx: peer_tx,
            peer_tx: local_tx,
            closed,
            answered,
            offered: Some(stream.clone()),
            senders: Mutex::new(Vec::new()),
        });

        let inbound = MediaChannel {
            link: far.clone(),
            events: peer_rx,
        };
        target
            .events
            .send(SignalingEvent::Call(inbound))
            .map_err(|_| Error::Call(format!("Peer {} is unreachable", remote)))?;

        self.reg.track_media(Arc::clone(&local));
        target.track_media(far);

        Ok(MediaChannel {
            link: local,
            events: local_rx,
        })
    }

    fn is_disconnected(&self) -> bool {
        self.reg.disconnected.load(Ordering::Acquire)
    }

    fn destroy(&self) {
        {
            let mut peers = self.hub.peers.lock();
            if peers.get(&self.id).is_some_and(|r| Arc::ptr_eq(r, &self.reg)) {
                peers.remove(&self.id);
            }
        }
        self.reg.disconnected.store(true, Ordering::Release);
        self.reg.close_all();
    }
}

struct MemoryDataLink {
    remote: PeerId,
    local_tx: mpsc::UnboundedSender<DataEvent>,
    peer_tx: mpsc::UnboundedSender<DataEvent>,
    closed: Arc<AtomicBool>,
}

impl DataLink for MemoryDataLink {
    fn remote(&self) -> &PeerId {
        &self.remote
    }

    fn send(&self, payload: DataPayload) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PeerConnect(format!("channel to {} is closed", self.remote)));
        }
        self.peer_tx
            .send(DataEvent::Data(payload))
            .map_err(|_| Error::PeerConnect(format!("{} stopped listening", self.remote)))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.local_tx.send(DataEvent::Close);
            let _ = self.peer_tx.send(DataEvent::Close);
        }
    }
}

struct MemoryMediaLink {
    remote: PeerId,
    local_tx: mpsc::UnboundedSender<MediaEvent>,
    peer_tx: mpsc::UnboundedSender<MediaEvent>,
    closed: Arc<AtomicBool>,
    answered: Arc<AtomicBool>,
    /// Caller's stream, present on the answering end
    offered: Option<MediaStream>,
    senders: Mutex<Vec<Arc<MemorySender>>>,
}

impl MediaLink for MemoryMediaLink {
    fn remote(&self) -> &PeerId {
        &self.remote
    }

    fn answer(&self, stream: Option<MediaStream>) {
        let Some(offered) = self.offered.clone() else {
            return;
        };
        if self.closed.load(Ordering::Acquire) || self.answered.swap(true, Ordering::AcqRel) {
            return;
        }
        let reply = stream.unwrap_or_else(MediaStream::empty);
        *self.senders.lock() = MemorySender::for_stream(&reply);
        let _ = self.local_tx.send(MediaEvent::Stream(offered));
        let _ = self.peer_tx.send(MediaEvent::Stream(reply));
    }

    fn senders(&self) -> Vec<Arc<dyn TrackSender>> {
        self.senders
            .lock()
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn TrackSender>)
            .collect()
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.local_tx.send(MediaEvent::Close);
            let _ = self.peer_tx.send(MediaEvent::Close);
        }
    }
}

struct MemorySender {
    track: Mutex<Option<MediaTrack>>,
}

impl MemorySender {
    fn for_stream(stream: &MediaStream) -> Vec<Arc<MemorySender>> {
        stream
            .tracks()
            .iter()
            .map(|t| {
                Arc::new(MemorySender {
                    track: Mutex::new(Some(t.clone())),
                })
            })
            .collect()
    }
}

impl TrackSender for MemorySender {
    fn track(&self) -> Option<MediaTrack> {
        self.track.lock().clone()
    }

    fn replace_track(&self, track: MediaTrack) {
        *self.track.lock() = Some(track);
    }
}
