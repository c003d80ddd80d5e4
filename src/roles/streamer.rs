//! Share role: capture the display, register, wait for a viewer to dial in,
//! then call it with the captured stream. Every unexpected close triggers
//! one gated reconnect against the same identity.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gate::SerialGate;
use crate::media::{MediaSource, MediaStream};
use crate::peer::types::{Epoch, PeerId};
use crate::reconnect::ReconnectLoop;
use crate::roles::{Phase, PhaseCell};
use crate::session::SessionManager;
use crate::signaling::Signaling;
use crate::ui::{
    sharing_code_status, ShareInfo, UiSink, STATUS_CONNECTED_VIEWER, STATUS_CONNECTING_SERVER,
    STATUS_CONNECT_FAILED, STATUS_RECONNECTING, STATUS_TERMINATED,
};
use crate::utils::sharing_link;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};
use url::Url;

pub struct Streamer {
    inner: Arc<StreamerInner>,
}

struct StreamerInner {
    session: SessionManager,
    gate: SerialGate,
    reconnect: ReconnectLoop,
    media: Arc<dyn MediaSource>,
    ui: Arc<dyn UiSink>,
    config: Config,
    page: Option<Url>,
    stream: Mutex<Option<MediaStream>>,
    preset: Mutex<usize>,
    phase: PhaseCell,
    /// Bumped by every explicit stop
    stops: AtomicU64,
}

impl Streamer {
    /// `page` is the URL the sharing link is built from
    pub fn new(
        signaling: Arc<dyn Signaling>,
        media: Arc<dyn MediaSource>,
        ui: Arc<dyn UiSink>,
        config: Config,
        page: Option<Url>,
    ) -> Self {
        let preset = config.default_preset;
        let inner = StreamerInner {
            session: SessionManager::new(signaling, config.id_prefix.clone()),
            gate: SerialGate::new(),
            reconnect: ReconnectLoop::new(),
            media,
            ui,
            config,
            page,
            stream: Mutex::new(None),
            preset: Mutex::new(preset),
            phase: PhaseCell::new("streamer"),
            stops: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn gate(&self) -> &SerialGate {
        &self.inner.gate
    }

    pub fn reconnect_loop(&self) -> &ReconnectLoop {
        &self.inner.reconnect
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    pub fn local_stream(&self) -> Option<MediaStream> {
        self.inner.stream.lock().clone()
    }

    pub fn preset(&self) -> usize {
        *self.inner.preset.lock()
    }

    /// Start sharing. Resolves once the first viewer receives the call.
    /// Any failure tears the session down and re-enables the start control;
    /// a [`Streamer::stop`] meanwhile has already done both.
    pub async fn run(&self) -> Result<ShareInfo> {
        let inner = &self.inner;
        inner.ui.controls_enabled(false);
        let _gate = inner.gate.acquire().await;
        let stops = inner.stops.load(Ordering::Acquire);

        match inner.share().await {
            Ok(info) => Ok(info),
            Err(err) if inner.stopped_since(stops) => {
                debug!("sharing ended by stop: {}", err);
                Err(err)
            }
            Err(err) => {
                error!("sharing failed: {}", err);
                inner.teardown();
                inner.ui.status(STATUS_CONNECT_FAILED);
                inner.ui.controls_enabled(true);
                Err(err)
            }
        }
    }

    /// Explicit stop or component removal: leave everything and stop capture
    pub fn stop(&self) {
        self.inner.stops.fetch_add(1, Ordering::AcqRel);
        self.inner.teardown();
        self.inner.ui.status(STATUS_TERMINATED);
        self.inner.ui.controls_enabled(true);
    }

    /// Change the capture preset. While a call is live the display is
    /// captured again and the new tracks are swapped into the call.
    pub async fn select_preset(&self, index: usize) -> Result<()> {
        let inner = &self.inner;
        if index >= inner.config.capture_presets.len() {
            return Err(Error::Config(format!("no capture preset {}", index)));
        }
        let _gate = inner.gate.acquire().await;
        *inner.preset.lock() = index;

        let live = inner.stream.lock().is_some() && inner.session.has_media_connection();
        if live {
            info!("switching capture to {}", inner.config.preset(index).label);
            inner.stop_stream();
            inner.capture().await?;
        }
        Ok(())
    }
}

impl StreamerInner {
    async fn share(self: &Arc<Self>) -> Result<ShareInfo> {
        self.reconnect.disable();
        self.capture().await?;

        self.phase.set(Phase::ConnectingSignaling);
        self.ui.status(STATUS_CONNECTING_SERVER);
        let id = self.session.connect_server().await?;
        let info = self.publish(&id);

        self.stream_to_viewer().await?;
        Ok(info)
    }

    /// Wait for a viewer, call it, and arm the next epoch's auto-reconnect
    async fn stream_to_viewer(self: &Arc<Self>) -> Result<()> {
        self.phase.set(Phase::ConnectingPeer);
        self.session.wait_peer().await?;
        self.ui.status(STATUS_CONNECTED_VIEWER);

        self.phase.set(Phase::PlacingCall);
        let stream = self
            .stream
            .lock()
            .clone()
            .ok_or_else(|| Error::Media("no local stream to share".into()))?;
        self.session.call(&stream).await?;

        self.arm_auto_reconnect()?;
        self.ui.status("");
        self.phase.set(Phase::Streaming);
        Ok(())
    }

    fn arm_auto_reconnect(self: &Arc<Self>) -> Result<()> {
        let signal = self.session.wait_close()?;
        self.reconnect.enable();
        let this: Weak<Self> = Arc::downgrade(self);
        let _ = self.reconnect.arm(signal, move |epoch| async move {
            if let Some(this) = this.upgrade() {
                this.auto_reconnect(epoch).await;
            }
        });
        Ok(())
    }

    async fn auto_reconnect(self: Arc<Self>, epoch: Epoch) {
        let _gate = self.gate.acquire().await;
        if self.session.current_epoch() != epoch || !self.reconnect.is_enabled() {
            debug!("close of epoch {} is stale, not reconnecting", epoch);
            return;
        }
        let stops = self.stops.load(Ordering::Acquire);

        self.phase.set(Phase::ClosedUnexpectedly);
        self.phase.set(Phase::Reconnecting);
        self.ui.status(STATUS_RECONNECTING);
        match self.resume().await {
            Ok(()) => info!("viewer reconnected (epoch {})", self.session.current_epoch()),
            Err(err) if self.stopped_since(stops) => {
                debug!("reconnect ended by stop: {}", err);
            }
            Err(err) => {
                warn!("auto-reconnect failed: {}", err);
                self.reconnect.disable();
                self.session.disconnect_all();
                self.phase.set(Phase::Idle);
                self.ui.status(STATUS_CONNECT_FAILED);
                self.ui.controls_enabled(true);
            }
        }
    }

    async fn resume(self: &Arc<Self>) -> Result<()> {
        let ended = self.stream.lock().as_ref().map_or(true, |s| s.is_ended());
        if ended {
            debug!("local capture ended, capturing again");
            self.capture().await?;
        }
        let id = self
            .session
            .id()
            .ok_or_else(|| Error::Protocol("reconnect without identity".into()))?;
        self.ui.status(&sharing_code_status(id.code(&self.config.id_prefix)));
        self.stream_to_viewer().await
    }

    fn publish(&self, id: &PeerId) -> ShareInfo {
        let info = ShareInfo {
            id: id.clone(),
            code: id.code(&self.config.id_prefix).to_string(),
            link: self
                .page
                .as_ref()
                .map(|page| sharing_link(page, &self.config.link_param, id)),
            registered_at: chrono::Utc::now(),
        };
        self.ui.share_info(&info);
        self.ui.status(&sharing_code_status(&info.code));
        info
    }

    /// Capture with the selected preset and swap it into any live call
    async fn capture(&self) -> Result<()> {
        let preset = self.config.preset(*self.preset.lock());
        let stream = self.media.capture(&preset).await?;
        self.session.replace_stream(&stream);
        self.ui.local_stream(&stream);
        *self.stream.lock() = Some(stream);
        Ok(())
    }

    fn stopped_since(&self, stops: u64) -> bool {
        self.stops.load(Ordering::Acquire) != stops
    }

    fn stop_stream(&self) {
        if let Some(stream) = self.stream.lock().as_ref() {
            stream.stop();
        }
    }

    fn teardown(&self) {
        self.reconnect.disable();
        self.session.disconnect_all();
        self.stop_stream();
        self.phase.set(Phase::Idle);
    }
}

impl Drop for StreamerInner {
    fn drop(&mut self) {
        self.reconnect.disable();
        self.stop_stream();
    }
}
