//! Transport abstraction layer for the liveness client.
//!
//! Two kinds of I/O leave the process:
//!
//! - **Request/response** calls to the token and session endpoints,
//!   abstracted by [`HttpTransport`] (a generic "send request, get
//!   status + body" primitive).
//! - **A persistent streaming connection** to the liveness engine,
//!   abstracted by [`Connection`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client connection via `tokio-tungstenite`
//! - `http` (default): HTTP transport via `reqwest`

#![allow(async_fn_in_trait)]

mod error;
mod http;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use http::{HttpRequest, HttpResponse, HttpTransport, is_empty_status};
#[cfg(feature = "http")]
pub use http::ReqwestTransport;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique tag for an engine connection, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next id. Ids increase monotonically and start at 1.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws#{}", self.0)
    }
}

/// A single connection that can send and receive bytes.
///
/// Sending and receiving are independent: a task may be parked in
/// [`recv`](Self::recv) while another task sends on the same connection.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends binary data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Sends a text frame to the remote peer.
    ///
    /// Defaults to sending the UTF-8 bytes as binary. Transports with a
    /// distinct text frame type (WebSocket) should override this.
    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.send(text.as_bytes()).await
    }

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
