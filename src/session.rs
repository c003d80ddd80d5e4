//! [`SessionManager`]: signaling registration, the peer data connection and
//! the active media connection of one component.
//!
//! Every `wait_*` operation and [`SessionManager::call`] race against the
//! close signal of the current data connection and reject with
//! [`Error::ConnectionClosed`] when the close fires first. None of the waits
//! carry a deadline: a silent signaling server or peer blocks the caller
//! until something closes.

use crate::error::{Error, Result};
use crate::media::{MediaStream, MediaTrack};
use crate::peer::close::CloseSignal;
use crate::peer::connection::spawn_router;
use crate::peer::data_channel::{attach_dc, drain_media, Opening};
use crate::peer::events::{EventBus, EventHandler};
use crate::peer::state::{Inbound, SessionState};
use crate::peer::types::{DataPayload, Epoch, PeerId};
use crate::signaling::{
    DataChannel, DataLink, MediaChannel, MediaEvent, MediaLink, Signaling, SignalingClient,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct SessionManager {
    signaling: Arc<dyn Signaling>,
    prefix: String,
    state: Mutex<SessionState>,
    bus: EventBus,
}

impl SessionManager {
    pub fn new(signaling: Arc<dyn Signaling>, prefix: impl Into<String>) -> Self {
        Self {
            signaling,
            prefix: prefix.into(),
            state: Mutex::new(SessionState::default()),
            bus: EventBus::new(),
        }
    }

    /// Local identity, if one has been minted
    pub fn id(&self) -> Option<PeerId> {
        self.state.lock().id.clone()
    }

    /// Remote end of the current data connection
    pub fn remote(&self) -> Option<PeerId> {
        self.state.lock().data.as_ref().map(|d| d.remote().clone())
    }

    pub fn current_epoch(&self) -> Epoch {
        self.state.lock().epoch
    }

    pub fn is_server_connected(&self) -> bool {
        self.state
            .lock()
            .client
            .as_ref()
            .is_some_and(|c| !c.is_disconnected())
    }

    pub fn has_media_connection(&self) -> bool {
        self.state.lock().media.is_some()
    }

    /// Register on the signaling server, minting an identity first if the
    /// session has none. A server rejection (e.g. id taken) is returned as
    /// [`Error::Signaling`]; there is no local retry with another id.
    pub async fn connect_server(&self) -> Result<PeerId> {
        let (id, stale) = {
            let mut st = self.state.lock();
            let id = st
                .id
                .get_or_insert_with(|| PeerId::generate(&self.prefix))
                .clone();
            (id, st.take_server())
        };
        if let Some(client) = stale {
            debug!("replacing registration of {}", client.id());
            client.destroy();
        }

        let (client, events) = self.signaling.open(&id);
        let (router, registered, inbound) = spawn_router(id.clone(), events);
        {
            let mut st = self.state.lock();
            st.client = Some(client);
            st.router = Some(router);
            st.inbound = Some(inbound);
        }

        let outcome = match registered.await {
            Ok(Ok(confirmed)) => return Ok(confirmed),
            Ok(Err(reason)) => Error::Signaling(reason),
            Err(_) => Error::Signaling(format!("registration of {} was dropped", id)),
        };
        if let Some(client) = self.state.lock().take_server() {
            client.destroy();
        }
        Err(outcome)
    }

    /// Dial `remote` and resolve once the data connection is open
    pub async fn connect_peer(&self, remote: &PeerId) -> Result<()> {
        self.dial(remote)?.wait().await
    }

    /// Arm a data connection to `remote` without waiting for it to open.
    /// The new close signal is in place when this returns.
    pub fn dial(&self, remote: &PeerId) -> Result<Opening> {
        let (client, inbound) = self.registration("connectPeer")?;
        // calls queued for an earlier connection would never stream
        if let Ok(mut calls) = inbound.calls.try_lock() {
            while let Ok(stale) = calls.try_recv() {
                debug!("discarding stale call from {}", stale.link.remote());
                stale.link.close();
            }
        }
        info!("dialing {}", remote);
        Ok(self.arm(client.connect(remote)))
    }

    /// Wait for a remote peer to dial us, then for that connection to open
    pub async fn wait_peer(&self) -> Result<()> {
        let (_, inbound) = self.registration("waitPeer")?;
        let channel = {
            let mut connections = inbound.connections.lock().await;
            connections.recv().await
        }
        .ok_or_else(|| Error::Signaling("signaling connection closed".into()))?;

        info!("inbound connection from {}", channel.link.remote());
        self.arm(channel).wait().await
    }

    /// Close signal of the current data connection
    pub fn wait_close(&self) -> Result<CloseSignal> {
        self.state
            .lock()
            .close
            .clone()
            .ok_or_else(|| Error::Protocol("waitClose before connection".into()))
    }

    /// Place a media call with `stream` to the connected peer, replacing any
    /// previous media connection. Resolves once the call is placed.
    pub async fn call(&self, stream: &MediaStream) -> Result<()> {
        let close = self.wait_close()?;
        let (client, _) = self.registration("call")?;
        let (remote, previous) = {
            let mut st = self.state.lock();
            let remote = st
                .data
                .as_ref()
                .map(|d| d.remote().clone())
                .ok_or_else(|| Error::Protocol("call before connection".into()))?;
            (remote, st.media.take())
        };
        if let Some(previous) = previous {
            previous.close();
        }
        if close.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let channel = tokio::select! {
            biased;
            _ = close.closed() => return Err(Error::ConnectionClosed),
            placed = client.call(&remote, stream) => placed?,
        };
        if close.is_closed() {
            channel.link.close();
            return Err(Error::ConnectionClosed);
        }

        info!("calling {} with stream {}", remote, stream.id());
        let MediaChannel { link, events } = channel;
        self.set_media(link);
        drain_media(remote, events);
        Ok(())
    }

    /// Answer the next inbound call and resolve with the remote stream
    pub async fn wait_call(&self) -> Result<MediaStream> {
        let close = self.wait_close()?;
        let (_, inbound) = self.registration("waitCall")?;

        tokio::select! {
            biased;
            _ = close.closed() => Err(Error::ConnectionClosed),
            stream = self.answer_next_call(&inbound) => stream,
        }
    }

    async fn answer_next_call(&self, inbound: &Inbound) -> Result<MediaStream> {
        let mut calls = inbound.calls.lock().await;
        loop {
            let MediaChannel { link, mut events } = calls
                .recv()
                .await
                .ok_or_else(|| Error::Signaling("signaling connection closed".into()))?;

            debug!("on call from {}", link.remote());
            self.set_media(Arc::clone(&link));
            link.answer(None);

            match Self::first_stream(&mut events).await {
                Some(result) => {
                    if result.is_ok() {
                        debug!("on stream from {}", link.remote());
                        drain_media(link.remote().clone(), events);
                    }
                    return result;
                }
                None => debug!("call from {} ended before streaming", link.remote()),
            }
        }
    }

    /// `None` when the call closed before producing a stream
    async fn first_stream(
        events: &mut mpsc::UnboundedReceiver<MediaEvent>,
    ) -> Option<Result<MediaStream>> {
        match events.recv().await {
            Some(MediaEvent::Stream(stream)) => Some(Ok(stream)),
            Some(MediaEvent::Error(err)) => Some(Err(Error::Call(err))),
            Some(MediaEvent::Close) | None => None,
        }
    }

    /// Close data and media connections; keep the registration and identity
    pub fn disconnect_peer(&self) {
        let (data, media) = self.state.lock().take_peer();
        if let Some(media) = media {
            media.close();
        }
        if let Some(data) = data {
            debug!("closing data connection to {}", data.remote());
            data.close();
        }
    }

    /// Close everything and forget the identity
    pub fn disconnect_all(&self) {
        let (data, media, client) = {
            let mut st = self.state.lock();
            let (data, media) = st.take_peer();
            let client = st.take_server();
            st.id = None;
            (data, media, client)
        };
        if let Some(media) = media {
            media.close();
        }
        if let Some(data) = data {
            data.close();
        }
        if let Some(client) = client {
            info!("leaving signaling server as {}", client.id());
            client.destroy();
        }
    }

    /// Swap each track of `stream` into the outgoing sender of the same
    /// kind, without renegotiating. Returns the number of tracks swapped.
    pub fn replace_stream(&self, stream: &MediaStream) -> usize {
        let Some(media) = self.state.lock().media.clone() else {
            return 0;
        };
        let senders = media.senders();
        let mut replaced = 0;
        for track in stream.tracks() {
            if let Some(sender) = senders.iter().find(|s| s.kind() == Some(track.kind())) {
                sender.replace_track(track.clone());
                replaced += 1;
            }
        }
        debug!("replaced {} track(s) on call to {}", replaced, media.remote());
        replaced
    }

    /// Tracks currently attached to the outgoing media connection
    pub fn outgoing_tracks(&self) -> Vec<MediaTrack> {
        let media = self.state.lock().media.clone();
        media
            .map(|m| m.senders().iter().filter_map(|s| s.track()).collect())
            .unwrap_or_default()
    }

    pub fn send_event(&self, payload: DataPayload) -> Result<()> {
        let data = self.state.lock().data.clone();
        match data {
            Some(data) => data.send(payload),
            None => Err(Error::PeerConnect("no data connection".into())),
        }
    }

    pub fn add_event_listener(&self, kind: impl Into<String>, handler: EventHandler) {
        self.bus.add_listener(kind, handler);
    }

    pub fn remove_all_event_listeners(&self, kind: Option<&str>) {
        self.bus.remove_all(kind);
    }

    fn registration(&self, op: &str) -> Result<(Arc<dyn SignalingClient>, Inbound)> {
        let st = self.state.lock();
        match (&st.client, &st.inbound) {
            (Some(client), Some(inbound)) => Ok((Arc::clone(client), inbound.clone())),
            _ => Err(Error::Protocol(format!("{} before connectServer", op))),
        }
    }

    /// Start a new connection epoch around `channel`
    fn arm(&self, channel: DataChannel) -> Opening {
        let link: Arc<dyn DataLink> = Arc::clone(&channel.link);
        let (opening, previous) = {
            let mut st = self.state.lock();
            st.epoch += 1;
            let (signal, opening) = attach_dc(channel, st.epoch, self.bus.clone());
            st.close = Some(signal);
            (opening, st.data.replace(link))
        };
        if let Some(previous) = previous {
            debug!("dropping data connection to {}", previous.remote());
            previous.close();
        }
        opening
    }

    fn set_media(&self, link: Arc<dyn MediaLink>) {
        let previous = self.state.lock().media.replace(link);
        if let Some(previous) = previous {
            previous.close();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.state.get_mut().client.is_some() {
            warn!("session dropped while registered, tearing down");
            self.disconnect_all();
        }
    }
}
