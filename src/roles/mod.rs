pub mod streamer;
pub mod viewer;

pub use streamer::Streamer;
pub use viewer::Viewer;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// Lifecycle phase of a role
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ConnectingSignaling,
    ConnectingPeer,
    /// Streamer: viewer connected, placing the call
    PlacingCall,
    /// Viewer: data connection armed, waiting for the call's stream
    AwaitingMedia,
    Streaming,
    ClosedUnexpectedly,
    Reconnecting,
    ForcedReconnecting,
}

#[derive(Debug)]
pub(crate) struct PhaseCell {
    role: &'static str,
    phase: Mutex<Phase>,
}

impl PhaseCell {
    pub(crate) fn new(role: &'static str) -> Self {
        Self {
            role,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub(crate) fn get(&self) -> Phase {
        *self.phase.lock()
    }

    pub(crate) fn set(&self, next: Phase) {
        let previous = std::mem::replace(&mut *self.phase.lock(), next);
        if previous != next {
            debug!("{}: {:?} -> {:?}", self.role, previous, next);
        }
    }
}
