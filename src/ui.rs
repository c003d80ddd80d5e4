use crate::media::MediaStream;
use crate::peer::types::PeerId;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const STATUS_CONNECTING_SERVER: &str = "connecting to server...";
pub const STATUS_CONNECTED_VIEWER: &str = "Connected to viewer, start streaming...";
pub const STATUS_CONNECTING: &str = "Connecting...";
pub const STATUS_RECONNECTING: &str = "Reconnecting...";
pub const STATUS_CONNECT_FAILED: &str = "Cannot connect to server, try again later";
pub const STATUS_TERMINATED: &str = "Terminated";

pub fn sharing_code_status(code: &str) -> String {
    format!("Your sharing code is {}", code)
}

/// What the streamer publishes once registered
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ShareInfo {
    pub id: PeerId,
    /// Digits the viewer types in
    pub code: String,
    /// Page URL carrying the id, when the page URL is known
    pub link: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Core → UI notifications. Called outside the gate's bookkeeping, from
/// whichever task runs the lifecycle step; keep implementations quick.
pub trait UiSink: Send + Sync {
    /// Status line; an empty string clears it
    fn status(&self, text: &str);

    fn share_info(&self, _info: &ShareInfo) {}

    /// Newly captured local stream, for preview
    fn local_stream(&self, _stream: &MediaStream) {}

    /// Stream received from the streamer, for playback
    fn remote_stream(&self, _stream: &MediaStream) {}

    /// Whether the start control should accept clicks
    fn controls_enabled(&self, _enabled: bool) {}
}
