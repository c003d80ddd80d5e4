//! Media stream handles shared with the UI collaborator.
//!
//! The session core only references streams: it attaches them to outgoing
//! calls and swaps their tracks into live senders. Capture and track
//! teardown belong to whoever implements [`MediaSource`].

use crate::config::CapturePreset;
use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug)]
struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    live: AtomicBool,
}

/// One audio or video track. Clones refer to the same track.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: random_token(),
                kind,
                label: label.into(),
                live: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.inner.live.store(false, Ordering::Release);
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A set of tracks captured together
#[derive(Debug, Clone, PartialEq)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: random_token(),
            tracks,
        }
    }

    /// Stream with no tracks, e.g. the answer side of a view-only call
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    /// True once every track has been stopped (or there are none)
    pub fn is_ended(&self) -> bool {
        self.tracks.iter().all(|t| !t.is_live())
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Display/audio capture, implemented by the UI collaborator
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Prompt for and capture a stream matching `preset`
    async fn capture(&self, preset: &CapturePreset) -> Result<MediaStream>;
}

fn random_token() -> String {
    format!("{:016x}", rand::rng().random::<u64>())
}
