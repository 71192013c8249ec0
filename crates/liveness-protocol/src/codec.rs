//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The streaming engine doesn't care which Rust type produced a frame, only
//! that it gets the agreed JSON. The engine client talks to a [`Codec`]
//! rather than to `serde_json` directly so tests and future formats can
//! swap it out.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the engine
/// client, which is shared across the orchestrator and the frame pump task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Serializes a value into a text frame payload.
    ///
    /// The default goes through [`encode`](Self::encode) and rejects
    /// output that isn't UTF-8.
    fn encode_text<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        let bytes = self.encode(value)?;
        String::from_utf8(bytes).map_err(|e| {
            ProtocolError::InvalidMessage(format!("encoded frame is not UTF-8: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use liveness_protocol::{ClientMessage, Codec, DetectionAction, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let msg = ClientMessage::Detect {
///     action: DetectionAction::Face,
///     retry: true,
///     timeout_ms: Some(15_000),
/// };
///
/// let text = codec.encode_text(&msg).unwrap();
/// assert!(text.contains(r#""type":"detect""#));
///
/// let decoded: ClientMessage = codec.decode(text.as_bytes()).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    fn encode_text<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }
}
