mod common;

use common::{eventually, init_logging, within};
use deskshare_lib::signaling::SignalingEvent;
use deskshare_lib::{
    Error, MediaStream, MediaTrack, MemorySignalingServer, PeerId, SessionManager, Signaling,
    SignalingClient, TrackKind,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

const PREFIX: &str = "RemoteDesktop";

fn session(server: &MemorySignalingServer) -> SessionManager {
    SessionManager::new(Arc::new(server.clone()), PREFIX)
}

fn screen() -> MediaStream {
    MediaStream::new(vec![
        MediaTrack::new(TrackKind::Video, "screen"),
        MediaTrack::new(TrackKind::Audio, "system audio"),
    ])
}

/// Register both sessions and open a data connection from `dialer` to
/// `listener`
async fn linked(dialer: &SessionManager, listener: &SessionManager) -> PeerId {
    let listener_id = within(listener.connect_server()).await.unwrap();
    within(dialer.connect_server()).await.unwrap();
    let (dialed, accepted) = within(async {
        tokio::join!(dialer.connect_peer(&listener_id), listener.wait_peer())
    })
    .await;
    dialed.unwrap();
    accepted.unwrap();
    listener_id
}

/// Broker whose ids are always already taken
struct Squatted(MemorySignalingServer);

impl Signaling for Squatted {
    fn open(
        &self,
        id: &PeerId,
    ) -> (Arc<dyn SignalingClient>, mpsc::UnboundedReceiver<SignalingEvent>) {
        let _squatter = self.0.open(id);
        self.0.open(id)
    }
}

#[tokio::test]
async fn test_connect_server_mints_prefixed_id() {
    init_logging();
    let server = MemorySignalingServer::new();
    let s = session(&server);
    assert_eq!(s.id(), None);

    let id = within(s.connect_server()).await.unwrap();
    assert!(PeerId::parse(PREFIX, id.as_str()).is_ok());
    assert_eq!(s.id(), Some(id.clone()));
    assert!(s.is_server_connected());
    assert!(server.is_registered(&id));
}

#[tokio::test]
async fn test_taken_id_is_a_signaling_error() {
    let s = SessionManager::new(Arc::new(Squatted(MemorySignalingServer::new())), PREFIX);
    let err = within(s.connect_server()).await.unwrap_err();
    assert!(matches!(err, Error::Signaling(ref reason) if reason.contains("is taken")));
    assert!(!s.is_server_connected());
    // the identity is kept for the caller to decide on
    assert!(s.id().is_some());
}

#[tokio::test]
async fn test_operations_before_connect_server() {
    let server = MemorySignalingServer::new();
    let s = session(&server);
    let remote = PeerId::from_remote("RemoteDesktop000001");

    assert_eq!(
        s.wait_close().unwrap_err(),
        Error::Protocol("waitClose before connection".into())
    );
    assert!(within(s.connect_peer(&remote)).await.unwrap_err().is_fatal());
    assert!(within(s.wait_peer()).await.unwrap_err().is_fatal());
    assert!(within(s.call(&screen())).await.unwrap_err().is_fatal());
    assert!(matches!(
        s.send_event(json!({ "type": "ping" })),
        Err(Error::PeerConnect(_))
    ));
}

#[tokio::test]
async fn test_peer_connection_and_close_both_ends() {
    let server = MemorySignalingServer::new();
    let a = session(&server);
    let b = session(&server);
    let b_id = linked(&a, &b).await;

    assert_eq!(a.remote(), Some(b_id));
    assert_eq!(b.remote(), a.id());
    assert_eq!(a.current_epoch(), 1);
    assert_eq!(b.current_epoch(), 1);

    let a_close = a.wait_close().unwrap();
    let b_close = b.wait_close().unwrap();
    assert!(!a_close.is_closed());

    b.disconnect_peer();
    within(a_close.closed()).await;
    within(b_close.closed()).await;
    assert!(b.is_server_connected());
}

#[tokio::test]
async fn test_dial_unknown_peer_rejects_and_closes() {
    let server = MemorySignalingServer::new();
    let s = session(&server);
    within(s.connect_server()).await.unwrap();

    let err = within(s.connect_peer(&PeerId::from_remote("RemoteDesktop999999")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PeerConnect(_)));
    assert!(err.is_retryable());

    let close = s.wait_close().unwrap();
    within(close.closed()).await;
}

#[tokio::test]
async fn test_each_connection_gets_a_fresh_close_signal() {
    let server = MemorySignalingServer::new();
    let a = session(&server);
    let b = session(&server);
    let b_id = linked(&a, &b).await;
    let first = a.wait_close().unwrap();

    let (dialed, accepted) = within(async {
        tokio::join!(a.connect_peer(&b_id), b.wait_peer())
    })
    .await;
    dialed.unwrap();
    accepted.unwrap();

    // arming the second connection closed the first
    within(first.closed()).await;
    let second = a.wait_close().unwrap();
    assert_eq!(first.epoch() + 1, second.epoch());
    assert!(!second.is_closed());
}

#[tokio::test]
async fn test_call_and_wait_call() {
    let server = MemorySignalingServer::new();
    let caller = session(&server);
    let callee = session(&server);
    linked(&callee, &caller).await;

    let stream = screen();
    let (placed, received) = within(async {
        tokio::join!(caller.call(&stream), callee.wait_call())
    })
    .await;
    placed.unwrap();
    assert_eq!(received.unwrap(), stream);
    assert!(caller.has_media_connection());
    assert!(callee.has_media_connection());
    assert_eq!(caller.outgoing_tracks(), stream.tracks().to_vec());
}

#[tokio::test]
async fn test_call_after_close_is_rejected() {
    let server = MemorySignalingServer::new();
    let caller = session(&server);
    let callee = session(&server);
    linked(&callee, &caller).await;

    callee.disconnect_peer();
    let close = caller.wait_close().unwrap();
    within(close.closed()).await;

    let err = within(caller.call(&screen())).await.unwrap_err();
    assert_eq!(err, Error::ConnectionClosed);
    assert!(!caller.has_media_connection());
}

#[tokio::test]
async fn test_close_wins_over_pending_wait_call() {
    let server = MemorySignalingServer::new();
    let caller = session(&server);
    let callee = session(&server);
    linked(&callee, &caller).await;

    let (waited, _) = within(async {
        tokio::join!(callee.wait_call(), async {
            tokio::task::yield_now().await;
            caller.disconnect_peer();
        })
    })
    .await;
    assert_eq!(waited.unwrap_err(), Error::ConnectionClosed);
}

#[tokio::test]
async fn test_replace_stream_swaps_tracks_in_place() {
    let server = MemorySignalingServer::new();
    let caller = session(&server);
    let callee = session(&server);
    linked(&callee, &caller).await;

    assert_eq!(caller.replace_stream(&screen()), 0);

    let first = screen();
    let (placed, received) = within(async {
        tokio::join!(caller.call(&first), callee.wait_call())
    })
    .await;
    placed.unwrap();
    received.unwrap();

    let next = MediaStream::new(vec![MediaTrack::new(TrackKind::Video, "window")]);
    assert_eq!(caller.replace_stream(&next), 1);
    let tracks = caller.outgoing_tracks();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.contains(next.track(TrackKind::Video).unwrap()));
    assert_eq!(
        tracks.iter().filter(|t| t.kind() == TrackKind::Audio).count(),
        1
    );
}

#[tokio::test]
async fn test_event_bus_over_data_connection() {
    let server = MemorySignalingServer::new();
    let a = session(&server);
    let b = session(&server);
    linked(&a, &b).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    b.add_event_listener(
        "pointer",
        Arc::new(move |payload| sink.lock().push(payload["x"].clone())),
    );

    a.send_event(json!({ "type": "pointer", "x": 10 })).unwrap();
    a.send_event(json!({ "type": "key", "code": "KeyA" })).unwrap();
    a.send_event(json!({ "x": 99 })).unwrap();
    eventually(|| seen.lock().len() == 1).await;
    assert_eq!(*seen.lock(), vec![json!(10)]);

    b.remove_all_event_listeners(Some("pointer"));
    a.send_event(json!({ "type": "pointer", "x": 11 })).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_disconnect_all_forgets_identity() {
    let server = MemorySignalingServer::new();
    let a = session(&server);
    let b = session(&server);
    let b_id = linked(&a, &b).await;
    let a_id = a.id().unwrap();
    let close = b.wait_close().unwrap();

    a.disconnect_all();
    assert_eq!(a.id(), None);
    assert!(!a.is_server_connected());
    assert!(!server.is_registered(&a_id));
    within(close.closed()).await;

    let next = within(a.connect_server()).await.unwrap();
    assert_ne!(next, a_id);
    assert!(server.is_registered(&next));
    assert!(server.is_registered(&b_id));
}

#[tokio::test]
async fn test_server_loss_keeps_peer_connection() {
    let server = MemorySignalingServer::new();
    let a = session(&server);
    let b = session(&server);
    linked(&a, &b).await;

    server.disconnect(&a.id().unwrap());
    eventually(|| !a.is_server_connected()).await;
    assert!(!a.wait_close().unwrap().is_closed());
    a.send_event(json!({ "type": "still-here" })).unwrap();
}
