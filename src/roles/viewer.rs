//! View role: register, dial the streamer's id, answer its call and hand the
//! remote stream to the UI.
//!
//! A forced reconnect suspends auto-reconnect before tearing the peer
//! connection down, so the close it causes is not taken for an unexpected
//! one, and resumes only once the replacement connection streams. A close
//! continuation that still slips through (it observed the close only after
//! the resume) finds a newer epoch once it holds the gate and backs off.

use crate::config::Config;
use crate::error::Result;
use crate::gate::SerialGate;
use crate::media::MediaStream;
use crate::peer::types::{Epoch, PeerId};
use crate::reconnect::ReconnectLoop;
use crate::roles::{Phase, PhaseCell};
use crate::session::SessionManager;
use crate::signaling::Signaling;
use crate::ui::{UiSink, STATUS_CONNECTING, STATUS_CONNECT_FAILED, STATUS_RECONNECTING};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

pub struct Viewer {
    inner: Arc<ViewerInner>,
}

struct ViewerInner {
    session: SessionManager,
    gate: SerialGate,
    reconnect: ReconnectLoop,
    ui: Arc<dyn UiSink>,
    stream: Mutex<Option<MediaStream>>,
    phase: PhaseCell,
    /// Bumped by every explicit stop
    stops: AtomicU64,
}

impl Viewer {
    pub fn new(signaling: Arc<dyn Signaling>, ui: Arc<dyn UiSink>, config: &Config) -> Self {
        let inner = ViewerInner {
            session: SessionManager::new(signaling, config.id_prefix.clone()),
            gate: SerialGate::new(),
            reconnect: ReconnectLoop::new(),
            ui,
            stream: Mutex::new(None),
            phase: PhaseCell::new("viewer"),
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

    pub fn remote_stream(&self) -> Option<MediaStream> {
        self.inner.stream.lock().clone()
    }

    /// Start control: re-dial if still registered, otherwise a full run
    pub async fn start(&self, remote: &PeerId) -> Result<()> {
        if self.inner.session.is_server_connected() {
            self.force_reconnect(remote).await
        } else {
            self.run(remote).await
        }
    }

    /// Register, connect to `remote` and wait for its stream. A failure
    /// tears the session down and is returned to the caller.
    pub async fn run(&self, remote: &PeerId) -> Result<()> {
        let inner = &self.inner;
        inner.ui.controls_enabled(false);
        let _gate = inner.gate.acquire().await;

        let stops = inner.stops.load(Ordering::Acquire);
        inner.ui.status(STATUS_CONNECTING);
        let result = inner.join(remote).await;

        match &result {
            Err(err) if inner.stopped_since(stops) => {
                debug!("viewing {} ended by stop: {}", remote, err);
            }
            Err(err) => {
                error!("viewing {} failed: {}", remote, err);
                inner.teardown();
                inner.ui.status(STATUS_CONNECT_FAILED);
            }
            Ok(()) => {}
        }
        inner.ui.controls_enabled(true);
        result
    }

    /// User-triggered re-dial while the old connection may still be alive
    pub async fn force_reconnect(&self, remote: &PeerId) -> Result<()> {
        let inner = &self.inner;
        inner.ui.controls_enabled(false);
        let _gate = inner.gate.acquire().await;

        inner.phase.set(Phase::ForcedReconnecting);
        inner.ui.status(STATUS_CONNECTING);
        let suspension = inner.reconnect.suspend();
        inner.session.disconnect_peer();

        let result = match inner.connect_streamer(remote).await {
            Ok(()) => {
                suspension.resume();
                inner.arm_auto_reconnect(remote)
            }
            Err(err) => {
                drop(suspension);
                Err(err)
            }
        };
        match &result {
            Ok(()) => info!("forced reconnect to {} done", remote),
            Err(err) => {
                warn!("forced reconnect to {} failed: {}", remote, err);
                inner.phase.set(Phase::Idle);
                inner.ui.status(STATUS_CONNECT_FAILED);
            }
        }
        inner.ui.controls_enabled(true);
        result
    }

    /// Component removal
    pub fn stop(&self) {
        self.inner.stops.fetch_add(1, Ordering::AcqRel);
        self.inner.teardown();
    }
}

impl ViewerInner {
    async fn join(self: &Arc<Self>, remote: &PeerId) -> Result<()> {
        self.phase.set(Phase::ConnectingSignaling);
        self.session.connect_server().await?;
        self.connect_streamer(remote).await?;
        self.arm_auto_reconnect(remote)
    }

    /// Dial and answer concurrently: the call may arrive as soon as the data
    /// connection opens. A failed dial also fires the close signal, so the
    /// dial's own error is reported ahead of the closed wait.
    async fn connect_streamer(&self, remote: &PeerId) -> Result<()> {
        self.phase.set(Phase::ConnectingPeer);
        let opening = self.session.dial(remote)?;

        self.phase.set(Phase::AwaitingMedia);
        let (opened, stream) = tokio::join!(opening.wait(), self.session.wait_call());
        opened?;
        let stream = stream?;

        self.ui.remote_stream(&stream);
        *self.stream.lock() = Some(stream);
        self.ui.status("");
        self.phase.set(Phase::Streaming);
        Ok(())
    }

    fn arm_auto_reconnect(self: &Arc<Self>, remote: &PeerId) -> Result<()> {
        let signal = self.session.wait_close()?;
        self.reconnect.enable();
        let this: Weak<Self> = Arc::downgrade(self);
        let remote = remote.clone();
        let _ = self.reconnect.arm(signal, move |epoch| async move {
            if let Some(this) = this.upgrade() {
                this.auto_reconnect(remote, epoch).await;
            }
        });
        Ok(())
    }

    async fn auto_reconnect(self: Arc<Self>, remote: PeerId, epoch: Epoch) {
        let _gate = self.gate.acquire().await;
        if self.session.current_epoch() != epoch || !self.reconnect.is_enabled() {
            debug!("close of epoch {} is stale, not reconnecting", epoch);
            return;
        }
        let stops = self.stops.load(Ordering::Acquire);

        self.phase.set(Phase::ClosedUnexpectedly);
        self.phase.set(Phase::Reconnecting);
        self.ui.status(STATUS_RECONNECTING);
        let result = match self.connect_streamer(&remote).await {
            Ok(()) => self.arm_auto_reconnect(&remote),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => info!("reconnected to {} (epoch {})", remote, self.session.current_epoch()),
            Err(err) if self.stopped_since(stops) => {
                debug!("reconnect to {} ended by stop: {}", remote, err);
            }
            Err(err) => {
                warn!("auto-reconnect to {} failed: {}", remote, err);
                self.teardown();
                self.ui.status(STATUS_CONNECT_FAILED);
                self.ui.controls_enabled(true);
            }
        }
    }

    fn stopped_since(&self, stops: u64) -> bool {
        self.stops.load(Ordering::Acquire) != stops
    }

    fn teardown(&self) {
        self.reconnect.disable();
        self.session.disconnect_all();
        self.phase.set(Phase::Idle);
    }
}

impl Drop for ViewerInner {
    fn drop(&mut self) {
        self.reconnect.disable();
    }
}
