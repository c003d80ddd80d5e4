//! Capability set of the external signaling service.
//!
//! The session core depends only on these traits. Every data or media
//! channel is handed out as a fresh value pairing a link handle with that
//! instance's own event receiver, so nothing ever has to unregister
//! listeners from a previous connection.

pub mod memory;

use crate::error::Result;
use crate::media::{MediaStream, MediaTrack, TrackKind};
use crate::peer::types::{DataPayload, PeerId};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events raised by a signaling registration
#[derive(Debug)]
pub enum SignalingEvent {
    /// The server confirmed the registration under this id
    Open(PeerId),
    /// Registration or server failure, e.g. the id is already taken
    Error(String),
    /// A remote peer dialed us
    Connection(DataChannel),
    /// A remote peer called us
    Call(MediaChannel),
    /// Lost the server; established channels may still be alive
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    Open,
    Data(DataPayload),
    Close,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Stream(MediaStream),
    Close,
    Error(String),
}

/// Outgoing control surface of a data channel
pub trait DataLink: Send + Sync {
    fn remote(&self) -> &PeerId;
    fn send(&self, payload: DataPayload) -> Result<()>;
    fn close(&self);
}

/// Outgoing track slot of a media channel
pub trait TrackSender: Send + Sync {
    fn track(&self) -> Option<MediaTrack>;
    fn replace_track(&self, track: MediaTrack);

    fn kind(&self) -> Option<TrackKind> {
        self.track().map(|t| t.kind())
    }
}

/// Outgoing control surface of a media channel
pub trait MediaLink: Send + Sync {
    fn remote(&self) -> &PeerId;
    /// Accept an inbound call, optionally sending a stream back
    fn answer(&self, stream: Option<MediaStream>);
    fn senders(&self) -> Vec<Arc<dyn TrackSender>>;
    fn close(&self);
}

/// One data connection instance and its own event queue
pub struct DataChannel {
    pub link: Arc<dyn DataLink>,
    pub events: mpsc::UnboundedReceiver<DataEvent>,
}

/// One media connection instance and its own event queue
pub struct MediaChannel {
    pub link: Arc<dyn MediaLink>,
    pub events: mpsc::UnboundedReceiver<MediaEvent>,
}

impl std::fmt::Debug for DataChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChannel")
            .field("remote", self.link.remote())
            .finish()
    }
}

impl std::fmt::Debug for MediaChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaChannel")
            .field("remote", self.link.remote())
            .finish()
    }
}

/// A live registration on the signaling server
#[async_trait]
pub trait SignalingClient: Send + Sync {
    fn id(&self) -> &PeerId;

    /// Dial `remote`. Failures arrive as [`DataEvent::Error`] on the channel.
    fn connect(&self, remote: &PeerId) -> DataChannel;

    /// Place a media call carrying `stream`
    async fn call(&self, remote: &PeerId, stream: &MediaStream) -> Result<MediaChannel>;

    /// True once the server connection is gone
    fn is_disconnected(&self) -> bool;

    /// Leave the server and close every channel of this registration
    fn destroy(&self);
}

/// Entry point to a signaling service
pub trait Signaling: Send + Sync {
    /// Start registering `id`. The outcome arrives as [`SignalingEvent::Open`]
    /// or [`SignalingEvent::Error`].
    fn open(
        &self,
        id: &PeerId,
    ) -> (Arc<dyn SignalingClient>, mpsc::UnboundedReceiver<SignalingEvent>);
}
