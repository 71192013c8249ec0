//! [`LivenessEngine`] over a WebSocket.
//!
//! Control messages are JSON text frames ([`ClientMessage`] out,
//! [`EngineMessage`] in); video frames go out as binary frames from a
//! background pump task.
//!
//! ```text
//! client                          engine
//!   │── auth {session_id, tx_id} ──▶│
//!   │◀──────── session_ready ────────│
//!   │══ binary frames (pump) ══════▶│
//!   │── detect {face, retry} ──────▶│
//!   │◀──────────── repeat ───────────│   (optional, once)
//!   │◀─────────── detected ──────────│
//!   │── close ─────────────────────▶│
//! ```
//!
//! # Handshake
//!
//! `open` refuses to dial at all when the streaming surface has no stream:
//! an engine connection without video can never pass a step. Once
//! connected, the first frame out is `auth`, and the engine must answer
//! `session_ready` within the handshake timeout (10 seconds unless
//! overridden). A `rejected` answer becomes [`EngineError::Rejected`].
//!
//! The connection is recorded before the handshake runs, so a failed or
//! timed-out handshake still leaves something for `close` to tear down.
//!
//! # Detection timeouts
//!
//! The timeout in [`DetectOptions`] bounds one engine attempt, not the
//! whole step. When the engine sends `repeat` it is starting its one
//! retry, so the deadline restarts and the caller's `on_repeat` callback
//! runs. A retryable step with timeout `T` can therefore take up to `2T`.
//!
//! # Teardown
//!
//! `close` stops the frame pump, sends `close` and closes the socket. It is
//! idempotent. Dropping the engine without calling `close` still stops the
//! pump and drops the socket, though the engine then sees a bare hang-up
//! instead of a `close` message.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use liveness_camera::{FrameReceiver, VideoSurface};
use liveness_protocol::{
    ClientMessage, Codec, DetectionAction, EngineMessage, JsonCodec, StreamAuth,
};
use liveness_transport::{Connection, WebSocketConnection};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use crate::{DetectOptions, EngineError, LivenessEngine};

/// How long `open` waits for `session_ready` by default.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// One open connection and its frame pump.
///
/// The pump task holds its own handle on the connection. Dropping `Live`
/// aborts the pump, so once both are gone the socket is dropped and the
/// engine sees the hang-up. This covers an engine dropped without `close`.
struct Live {
    conn: Arc<WebSocketConnection>,
    pump: Option<JoinHandle<()>>,
}

impl Drop for Live {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Talks to the liveness engine over a WebSocket.
///
/// Holds at most one connection. Opening again closes the previous one
/// first. All methods take `&self`; the connection sits behind an async
/// mutex that is only held long enough to clone or take the handle, so a
/// `close` is never stuck behind a parked `detect`.
pub struct WsLivenessEngine<C: Codec = JsonCodec> {
    /// Encodes control frames and decodes engine replies.
    codec: C,
    /// How long `open` waits for `session_ready`.
    handshake_timeout: Duration,
    /// The open connection, if any.
    live: Mutex<Option<Live>>,
    /// Shared with the pump task, which bumps it per uploaded frame.
    frames_sent: Arc<AtomicU64>,
}

impl WsLivenessEngine<JsonCodec> {
    /// An engine client speaking JSON with the default handshake timeout.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl Default for WsLivenessEngine<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> WsLivenessEngine<C> {
    /// An engine client using `codec` for control frames.
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            live: Mutex::new(None),
            frames_sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Overrides how long `open` waits for `session_ready`.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Video frames uploaded since creation.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// `true` between a successful connect and the matching `close`,
    /// including a connection whose handshake failed.
    pub async fn is_open(&self) -> bool {
        self.live.lock().await.is_some()
    }

    /// Encodes `msg` and sends it as a text frame.
    async fn send(&self, conn: &WebSocketConnection, msg: &ClientMessage) -> Result<(), EngineError> {
        let text = self.codec.encode_text(msg)?;
        conn.send_text(&text).await?;
        Ok(())
    }

    /// Reads the next engine message. `Ok(None)` means the engine hung up.
    async fn next_message(
        &self,
        conn: &WebSocketConnection,
    ) -> Result<Option<EngineMessage>, EngineError> {
        match conn.recv().await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Sends `auth` and waits for the engine's verdict on it.
    async fn handshake(
        &self,
        conn: &WebSocketConnection,
        auth: &StreamAuth,
    ) -> Result<(), EngineError> {
        self.send(conn, &ClientMessage::from(auth.clone())).await?;

        let reply = time::timeout(self.handshake_timeout, self.next_message(conn))
            .await
            .map_err(|_| EngineError::HandshakeTimedOut(self.handshake_timeout))??;

        match reply {
            Some(EngineMessage::SessionReady { session_id }) => {
                if session_id != auth.session_id {
                    warn!(
                        expected = %auth.session_id,
                        confirmed = %session_id,
                        "engine confirmed a different session id"
                    );
                }
                Ok(())
            }
            Some(EngineMessage::Rejected { reason }) => Err(EngineError::Rejected { reason }),
            Some(other) => Err(EngineError::UnexpectedMessage(format!("{other:?}"))),
            None => Err(EngineError::ConnectionClosed),
        }
    }

    /// Uploads every frame of the streaming surface as a binary frame until
    /// the video ends or a send fails.
    fn spawn_pump(&self, conn: Arc<WebSocketConnection>, mut frames: FrameReceiver) -> JoinHandle<()> {
        let frames_sent = Arc::clone(&self.frames_sent);
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Err(e) = conn.send(&frame.data).await {
                    debug!(conn_id = %conn.id(), error = %e, "frame upload stopped");
                    return;
                }
                frames_sent.fetch_add(1, Ordering::Relaxed);
                trace!(conn_id = %conn.id(), seq = frame.seq, "frame sent");
            }
            debug!(conn_id = %conn.id(), "video ended, frame upload stopped");
        })
    }
}

impl<C: Codec> LivenessEngine for WsLivenessEngine<C> {
    async fn open(
        &self,
        url: &str,
        surface: &VideoSurface,
        auth: &StreamAuth,
    ) -> Result<(), EngineError> {
        let frames = surface.frames().ok_or(EngineError::NoVideo)?;

        // Never leave a previous connection dangling.
        self.close().await;

        let conn = Arc::new(
            WebSocketConnection::connect(url)
                .await
                .map_err(EngineError::Connect)?,
        );
        *self.live.lock().await = Some(Live {
            conn: Arc::clone(&conn),
            pump: None,
        });

        self.handshake(&conn, auth).await?;

        let pump = self.spawn_pump(Arc::clone(&conn), frames);
        if let Some(live) = self.live.lock().await.as_mut() {
            live.pump = Some(pump);
        } else {
            // Closed while the handshake was in flight.
            pump.abort();
            return Err(EngineError::NotOpen);
        }

        info!(
            conn_id = %conn.id(),
            session_id = %auth.session_id,
            surface = surface.name(),
            "liveness engine connection open"
        );
        Ok(())
    }

    async fn detect(
        &self,
        action: DetectionAction,
        options: DetectOptions,
    ) -> Result<(), EngineError> {
        let conn = match self.live.lock().await.as_ref() {
            Some(live) => Arc::clone(&live.conn),
            None => return Err(EngineError::NotOpen),
        };

        self.send(
            &conn,
            &ClientMessage::Detect {
                action,
                retry: options.retry,
                timeout_ms: options.timeout.map(|t| t.as_millis() as u64),
            },
        )
        .await?;
        debug!(%action, retry = options.retry, timeout = ?options.timeout, "detection requested");

        let mut deadline = options.timeout.map(|t| Instant::now() + t);
        loop {
            let next = match deadline {
                Some(at) => time::timeout_at(at, self.next_message(&conn))
                    .await
                    .map_err(|_| EngineError::DetectionTimedOut {
                        action,
                        after: options.timeout.unwrap_or_default(),
                    })??,
                None => self.next_message(&conn).await?,
            };

            match next {
                Some(EngineMessage::Detected { action: got }) if got == action => {
                    info!(%action, "action detected");
                    return Ok(());
                }
                Some(EngineMessage::Failed { action: got, reason }) if got == action => {
                    warn!(%action, %reason, "detection failed");
                    return Err(EngineError::DetectionFailed { action, reason });
                }
                Some(EngineMessage::Repeat { action: got }) if got == action => {
                    debug!(%action, "engine repeating action");
                    options.notify_repeat(action);
                    deadline = options.timeout.map(|t| Instant::now() + t);
                }
                Some(EngineMessage::Rejected { reason }) => {
                    return Err(EngineError::Rejected { reason });
                }
                Some(other) => {
                    trace!(%action, message = ?other, "ignoring unrelated engine message");
                }
                None => return Err(EngineError::ConnectionClosed),
            }
        }
    }

    async fn close(&self) {
        let Some(mut live) = self.live.lock().await.take() else {
            trace!("close on a closed engine connection");
            return;
        };

        if let Some(pump) = live.pump.take() {
            pump.abort();
        }
        if let Err(e) = self.send(&live.conn, &ClientMessage::Close).await {
            debug!(conn_id = %live.conn.id(), error = %e, "close message not delivered");
        }
        if let Err(e) = live.conn.close().await {
            debug!(conn_id = %live.conn.id(), error = %e, "connection close failed");
        }
        info!(conn_id = %live.conn.id(), "liveness engine connection closed");
    }
}
