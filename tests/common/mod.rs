#![allow(dead_code)]

use async_trait::async_trait;
use deskshare_lib::{
    CapturePreset, Error, MediaSource, MediaStream, MediaTrack, Result, ShareInfo, TrackKind,
    UiSink,
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const STEP: Duration = Duration::from_secs(5);

/// UI double that records every notification
#[derive(Default)]
pub struct RecordingUi {
    pub statuses: Mutex<Vec<String>>,
    pub shares: Mutex<Vec<ShareInfo>>,
    pub local_streams: Mutex<Vec<MediaStream>>,
    pub remote_streams: Mutex<Vec<MediaStream>>,
    pub controls: Mutex<Vec<bool>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().last().cloned()
    }

    pub fn saw_status(&self, text: &str) -> bool {
        self.statuses.lock().iter().any(|s| s == text)
    }

    pub fn status_count(&self, text: &str) -> usize {
        self.statuses.lock().iter().filter(|s| *s == text).count()
    }

    pub fn remote_count(&self) -> usize {
        self.remote_streams.lock().len()
    }

    pub fn last_remote(&self) -> Option<MediaStream> {
        self.remote_streams.lock().last().cloned()
    }

    pub fn controls_state(&self) -> Option<bool> {
        self.controls.lock().last().copied()
    }
}

impl UiSink for RecordingUi {
    fn status(&self, text: &str) {
        self.statuses.lock().push(text.to_string());
    }

    fn share_info(&self, info: &ShareInfo) {
        self.shares.lock().push(info.clone());
    }

    fn local_stream(&self, stream: &MediaStream) {
        self.local_streams.lock().push(stream.clone());
    }

    fn remote_stream(&self, stream: &MediaStream) {
        self.remote_streams.lock().push(stream.clone());
    }

    fn controls_enabled(&self, enabled: bool) {
        self.controls.lock().push(enabled);
    }
}

/// Capture double producing a fresh video + audio stream per call
#[derive(Default)]
pub struct FakeMediaSource {
    pub captures: AtomicUsize,
    pub presets: Mutex<Vec<CapturePreset>>,
    pub fail: AtomicBool,
}

impl FakeMediaSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let source = Self::default();
        source.fail.store(true, Ordering::SeqCst);
        Arc::new(source)
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeMediaSource {
    async fn capture(&self, preset: &CapturePreset) -> Result<MediaStream> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Media("permission denied".into()));
        }
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.presets.lock().push(preset.clone());
        Ok(MediaStream::new(vec![
            MediaTrack::new(TrackKind::Video, format!("screen {}", preset.label)),
            MediaTrack::new(TrackKind::Audio, "system audio"),
        ]))
    }
}

/// Bound an await so a hung lifecycle step fails the test instead of
/// stalling the suite
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(STEP, fut)
        .await
        .expect("step timed out")
}

/// Poll `check` until it holds or the step deadline passes
pub async fn eventually(mut check: impl FnMut() -> bool) {
    within(async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

pub fn init_logging() {
    let _ = deskshare_lib::logger::init(&deskshare_lib::LoggingConfig {
        enabled: true,
        filter: "deskshare_lib=debug".into(),
    });
}
