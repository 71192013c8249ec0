//! Integration tests for the WebSocket liveness engine client.
//!
//! Each test runs a scripted engine on a loopback port: it accepts one
//! WebSocket, reads the client's control frames and answers as the real
//! engine would.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use liveness_camera::{FrameSource, VideoSurface};
use liveness_protocol::{ClientMessage, DetectionAction, StreamAuth};
use liveness_stream::{DetectOptions, EngineError, LivenessEngine, WsLivenessEngine};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Scripted engine
// =========================================================================

type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// The server end of one client connection.
struct EngineSide {
    ws: ServerWs,
    binary_frames: Vec<Vec<u8>>,
}

impl EngineSide {
    /// Next control message, collecting any video frames on the way.
    /// `None` once the client hangs up.
    async fn next_control(&mut self) -> Option<ClientMessage> {
        while let Some(msg) = self.ws.next().await {
            match msg.ok()? {
                Message::Text(text) => {
                    return Some(serde_json::from_str(text.as_str()).expect("valid control frame"));
                }
                Message::Binary(data) => self.binary_frames.push(data.to_vec()),
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    }

    async fn reply(&mut self, msg: Value) {
        self.ws
            .send(Message::Text(msg.to_string().into()))
            .await
            .expect("engine reply should send");
    }

    /// Reads the auth frame and confirms the session.
    async fn accept_auth(&mut self) -> ClientMessage {
        let auth = self.next_control().await.expect("auth frame");
        let ClientMessage::Auth { session_id, .. } = &auth else {
            panic!("first frame must be auth, got {auth:?}");
        };
        let session_id = session_id.clone();
        self.reply(json!({"type": "session_ready", "session_id": session_id}))
            .await;
        auth
    }
}

/// Starts a one-connection engine running `script`, returning its URL and
/// the script's result.
async fn engine<F, Fut, T>(script: F) -> (String, JoinHandle<T>)
where
    F: FnOnce(EngineSide) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = T> + Send,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("should accept");
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake should succeed");
        script(EngineSide {
            ws,
            binary_frames: Vec::new(),
        })
        .await
    });
    (url, handle)
}

fn auth() -> StreamAuth {
    StreamAuth {
        session_id: "s1".into(),
        tx_id: "7f1d7c4e-0000-4000-8000-000000000001".into(),
    }
}

fn surface_with_video() -> (FrameSource, VideoSurface) {
    let source = FrameSource::new(16);
    let surface = VideoSurface::new("streaming");
    surface.attach(source.stream(false));
    (source, surface)
}

// =========================================================================
// open
// =========================================================================

#[tokio::test]
async fn test_open_sends_auth_and_waits_for_session_ready() {
    let (url, server) = engine(|mut side| async move { side.accept_auth().await }).await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();

    client.open(&url, &surface, &auth()).await.expect("open should succeed");

    assert!(client.is_open().await);
    let sent = server.await.unwrap();
    assert_eq!(
        sent,
        ClientMessage::Auth {
            session_id: "s1".into(),
            tx_id: auth().tx_id,
        }
    );
    client.close().await;
}

#[tokio::test]
async fn test_open_without_video_returns_no_video() {
    let client = WsLivenessEngine::new();
    let empty = VideoSurface::new("streaming");

    // No connection attempt is made, so the URL is never dialled.
    let result = client.open("ws://127.0.0.1:1", &empty, &auth()).await;

    assert!(matches!(result, Err(EngineError::NoVideo)));
    assert!(!client.is_open().await);
}

#[tokio::test]
async fn test_open_unreachable_engine_returns_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();

    let result = client.open(&url, &surface, &auth()).await;

    assert!(matches!(result, Err(EngineError::Connect(_))), "got {result:?}");
}

#[tokio::test]
async fn test_open_rejected_returns_reason_and_close_still_works() {
    let (url, server) = engine(|mut side| async move {
        side.next_control().await;
        side.reply(json!({"type": "rejected", "reason": "unknown session"}))
            .await;
        // The client's close frame arrives after the rejection.
        side.next_control().await
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();

    let result = client.open(&url, &surface, &auth()).await;

    assert!(
        matches!(&result, Err(EngineError::Rejected { reason }) if reason == "unknown session"),
        "got {result:?}"
    );
    assert!(client.is_open().await, "half-open connection kept for close");

    client.close().await;
    assert!(!client.is_open().await);
    assert_eq!(server.await.unwrap(), Some(ClientMessage::Close));
}

#[tokio::test]
async fn test_open_silent_engine_times_out_handshake() {
    let (url, _server) = engine(|mut side| async move {
        side.next_control().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new().with_handshake_timeout(Duration::from_millis(100));

    let result = client.open(&url, &surface, &auth()).await;

    assert!(matches!(result, Err(EngineError::HandshakeTimedOut(_))));
    client.close().await;
}

#[tokio::test]
async fn test_open_uploads_video_frames_as_binary() {
    let (url, server) = engine(|mut side| async move {
        side.accept_auth().await;
        // Frames keep flowing until the client sends its close message.
        let last = side.next_control().await;
        (last, side.binary_frames)
    })
    .await;
    let (source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    for i in 0..3u8 {
        source.push(vec![i; 4]);
    }
    for _ in 0..200 {
        if client.frames_sent() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(client.frames_sent(), 3);

    client.close().await;
    let (last, frames) = server.await.unwrap();
    assert_eq!(last, Some(ClientMessage::Close));
    assert_eq!(frames, vec![vec![0u8; 4], vec![1u8; 4], vec![2u8; 4]]);
}

// =========================================================================
// detect
// =========================================================================

#[tokio::test]
async fn test_detect_before_open_returns_not_open() {
    let client = WsLivenessEngine::new();

    let result = client.detect(DetectionAction::Face, DetectOptions::new()).await;

    assert!(matches!(result, Err(EngineError::NotOpen)));
}

#[tokio::test]
async fn test_detect_detected_returns_ok() {
    let (url, server) = engine(|mut side| async move {
        side.accept_auth().await;
        let detect = side.next_control().await;
        side.reply(json!({"type": "detected", "action": "face"})).await;
        detect
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    let options = DetectOptions::new().retry(true).timeout(Duration::from_secs(15));
    client
        .detect(DetectionAction::Face, options)
        .await
        .expect("face should be detected");

    assert_eq!(
        server.await.unwrap(),
        Some(ClientMessage::Detect {
            action: DetectionAction::Face,
            retry: true,
            timeout_ms: Some(15_000),
        })
    );
    client.close().await;
}

#[tokio::test]
async fn test_detect_failed_returns_detection_failed() {
    let (url, _server) = engine(|mut side| async move {
        side.accept_auth().await;
        side.next_control().await;
        side.reply(json!({"type": "failed", "action": "smile", "reason": "no smile"}))
            .await;
        side.next_control().await
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    let err = client
        .detect(DetectionAction::Smile, DetectOptions::new().retry(true))
        .await
        .unwrap_err();

    assert!(err.is_detection());
    assert!(matches!(
        err,
        EngineError::DetectionFailed { action: DetectionAction::Smile, ref reason } if reason == "no smile"
    ));
    client.close().await;
}

#[tokio::test]
async fn test_detect_repeat_invokes_callback_then_succeeds() {
    let (url, _server) = engine(|mut side| async move {
        side.accept_auth().await;
        side.next_control().await;
        side.reply(json!({"type": "repeat", "action": "face"})).await;
        side.reply(json!({"type": "detected", "action": "face"})).await;
        side.next_control().await
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    let repeats = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&repeats);
    let options = DetectOptions::new().retry(true).on_repeat(move |action| {
        assert_eq!(action, DetectionAction::Face);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.detect(DetectionAction::Face, options).await.unwrap();

    assert_eq!(repeats.load(Ordering::SeqCst), 1);
    client.close().await;
}

#[tokio::test]
async fn test_detect_silent_engine_times_out() {
    let (url, _server) = engine(|mut side| async move {
        side.accept_auth().await;
        side.next_control().await;
        side.next_control().await
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    let started = Instant::now();
    let err = client
        .detect(
            DetectionAction::Face,
            DetectOptions::new().timeout(Duration::from_millis(150)),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(matches!(
        err,
        EngineError::DetectionTimedOut { action: DetectionAction::Face, after }
            if after == Duration::from_millis(150)
    ));
    client.close().await;
}

#[tokio::test]
async fn test_detect_repeat_restarts_attempt_timeout() {
    // Verdict lands 400 ms after the request: past one 300 ms window, but
    // inside the second window opened by the repeat.
    let (url, _server) = engine(|mut side| async move {
        side.accept_auth().await;
        side.next_control().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        side.reply(json!({"type": "repeat", "action": "smile"})).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        side.reply(json!({"type": "detected", "action": "smile"})).await;
        side.next_control().await
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    let result = client
        .detect(
            DetectionAction::Smile,
            DetectOptions::new()
                .retry(true)
                .timeout(Duration::from_millis(300)),
        )
        .await;

    assert!(result.is_ok(), "got {result:?}");
    client.close().await;
}

#[tokio::test]
async fn test_detect_ignores_messages_for_other_actions() {
    let (url, _server) = engine(|mut side| async move {
        side.accept_auth().await;
        side.next_control().await;
        side.reply(json!({"type": "failed", "action": "face", "reason": "stale"}))
            .await;
        side.reply(json!({"type": "detected", "action": "smile"})).await;
        side.next_control().await
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    let result = client.detect(DetectionAction::Smile, DetectOptions::new()).await;

    assert!(result.is_ok(), "got {result:?}");
    client.close().await;
}

#[tokio::test]
async fn test_detect_engine_hangs_up_returns_connection_closed() {
    let (url, _server) = engine(|mut side| async move {
        side.accept_auth().await;
        side.next_control().await;
        side.ws.close(None).await.ok();
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    let err = client
        .detect(DetectionAction::Face, DetectOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ConnectionClosed), "got {err:?}");
    assert!(!err.is_detection());
    client.close().await;
}

// =========================================================================
// close
// =========================================================================

#[tokio::test]
async fn test_close_twice_second_is_noop() {
    let (url, server) = engine(|mut side| async move {
        side.accept_auth().await;
        let first = side.next_control().await;
        let after = side.next_control().await;
        (first, after)
    })
    .await;
    let (_source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    client.close().await;
    client.close().await;

    let (first, after) = server.await.unwrap();
    assert_eq!(first, Some(ClientMessage::Close));
    assert_eq!(after, None, "nothing follows the first close");
    assert!(matches!(
        client.detect(DetectionAction::Face, DetectOptions::new()).await,
        Err(EngineError::NotOpen)
    ));
}

#[tokio::test]
async fn test_close_never_opened_is_noop() {
    let client = WsLivenessEngine::new();
    client.close().await;
    assert!(!client.is_open().await);
}

// =========================================================================
// drop
// =========================================================================

#[tokio::test]
async fn test_drop_open_engine_hangs_up_and_stops_upload() {
    let (url, server) = engine(|mut side| async move {
        side.accept_auth().await;
        let after = tokio::time::timeout(Duration::from_secs(1), side.next_control()).await;
        (after, side.binary_frames)
    })
    .await;
    let (source, surface) = surface_with_video();
    let client = WsLivenessEngine::new();
    client.open(&url, &surface, &auth()).await.unwrap();

    drop(client);
    for i in 0..5u8 {
        source.push(vec![i; 4]);
    }

    let (after, frames) = server.await.unwrap();
    assert!(
        matches!(after, Ok(None)),
        "engine should see the socket go away, got {after:?}"
    );
    assert!(frames.is_empty(), "{} frames uploaded after drop", frames.len());
}
