mod utils;

pub mod config;
pub mod error;
pub mod gate;
pub mod launcher;
pub mod logger;
pub mod media;
pub mod peer;
pub mod reconnect;
pub mod roles;
pub mod session;
pub mod signaling;
pub mod ui;

pub use config::{CapturePreset, Config, LoggingConfig};
pub use error::{Error, Result};
pub use gate::{GateGuard, SerialGate};
pub use launcher::{select_role, Role};
pub use media::{MediaSource, MediaStream, MediaTrack, TrackKind};
pub use peer::{CloseSignal, DataPayload, Epoch, EventHandler, PeerId};
pub use reconnect::{ReconnectLoop, ReconnectMode};
pub use roles::{Phase, Streamer, Viewer};
pub use session::SessionManager;
pub use signaling::memory::MemorySignalingServer;
pub use signaling::{Signaling, SignalingClient};
pub use ui::{ShareInfo, UiSink};
pub use utils::{peer_id_from_code, sharing_link};
