//! Error types for the streaming engine connection.

use std::time::Duration;

use liveness_protocol::{DetectionAction, ProtocolError};
use liveness_transport::TransportError;

/// Errors from opening, using or closing the engine connection.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The streaming surface has no stream to upload.
    #[error("no video attached to the streaming surface")]
    NoVideo,

    /// The connection could not be established.
    #[error("could not connect to the liveness engine: {0}")]
    Connect(#[source] TransportError),

    /// The engine refused the session credentials.
    #[error("engine rejected the session: {reason}")]
    Rejected { reason: String },

    /// The engine did not confirm the session in time.
    #[error("engine did not confirm the session within {0:?}")]
    HandshakeTimedOut(Duration),

    /// Sending or receiving on an open connection failed.
    #[error("engine connection failed: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The engine sent something that makes no sense at this point.
    #[error("unexpected engine message: {0}")]
    UnexpectedMessage(String),

    /// `detect` was called without a successful `open`.
    #[error("engine connection is not open")]
    NotOpen,

    /// The engine closed the connection mid-step.
    #[error("engine closed the connection")]
    ConnectionClosed,

    /// The engine reported that the action was not observed.
    #[error("{action} detection failed: {reason}")]
    DetectionFailed {
        action: DetectionAction,
        reason: String,
    },

    /// No verdict arrived within the step timeout.
    #[error("{action} detection timed out after {after:?}")]
    DetectionTimedOut {
        action: DetectionAction,
        after: Duration,
    },
}

impl EngineError {
    /// `true` for verdicts about a step, as opposed to connection trouble.
    pub fn is_detection(&self) -> bool {
        matches!(
            self,
            Self::DetectionFailed { .. } | Self::DetectionTimedOut { .. }
        )
    }
}
