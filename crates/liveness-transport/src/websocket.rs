//! Client side of the engine WebSocket, built on `tokio-tungstenite`.

use std::io;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn io_error(kind: io::ErrorKind, err: tungstenite::Error) -> io::Error {
    io::Error::new(kind, err)
}

/// An open connection to the liveness engine.
///
/// Read and write halves sit behind separate locks, so the frame pump can
/// keep uploading video while a detect call waits on `recv`.
pub struct WebSocketConnection {
    id: ConnectionId,
    url: String,
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    /// Opens a connection to `url` (`ws://` or `wss://`).
    ///
    /// # Errors
    /// [`TransportError::ConnectFailed`] when DNS, TCP, TLS or the upgrade
    /// handshake fails.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            TransportError::ConnectFailed {
                url: url.to_string(),
                source: io_error(io::ErrorKind::ConnectionRefused, e),
            }
        })?;

        let id = ConnectionId::next();
        tracing::debug!(%id, url, "engine socket connected");

        let (writer, reader) = ws.split();
        Ok(Self {
            id,
            url: url.to_string(),
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed(io_error(io::ErrorKind::BrokenPipe, e)))
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.write(Message::binary(data.to_vec())).await
    }

    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.write(Message::text(text.to_string())).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        while let Some(next) = reader.next().await {
            let msg = next.map_err(|e| {
                TransportError::ReceiveFailed(io_error(io::ErrorKind::ConnectionReset, e))
            })?;
            match msg {
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(frame) => {
                    tracing::debug!(id = %self.id, ?frame, "engine sent close");
                    return Ok(None);
                }
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        writer
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(io_error(io::ErrorKind::BrokenPipe, e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
