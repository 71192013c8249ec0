//! Unified error type for the liveness client.

use std::time::Duration;

use liveness_protocol::DetectionAction;
use liveness_session::{AuthError, SessionError};
use liveness_stream::EngineError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// Every variant except [`NotReady`](Self::NotReady) and
/// [`Config`](Self::Config) ends an attempt in
/// [`Aborted`](crate::OrchestratorState::Aborted).
#[derive(Debug, thiserror::Error)]
pub enum LivenessError {
    /// Start was requested before camera permission was granted.
    ///
    /// Camera failures end up here: the controller turns every
    /// [`CameraError`](liveness_camera::CameraError) into a denied
    /// permission, and a denied permission blocks `start`.
    #[error("camera permission has not been granted")]
    NotReady,

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No bearer credential could be obtained.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The session endpoint refused or garbled the request.
    #[error(transparent)]
    Session(SessionError),

    /// The engine connection could not be opened or authenticated.
    #[error("could not open the liveness engine connection: {0}")]
    Connection(#[source] EngineError),

    /// A detection step failed, timed out, or lost its connection.
    #[error("{action} step failed: {source}")]
    Detection {
        action: DetectionAction,
        #[source]
        source: EngineError,
    },

    /// The engine gave no verdict within the step budget.
    #[error("{action} step exceeded its {budget:?} budget")]
    StepTimedOut {
        action: DetectionAction,
        budget: Duration,
    },
}

// Auth failures keep their own variant even when they surface through the
// session client.
impl From<SessionError> for LivenessError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Auth(auth) => Self::Auth(auth),
            other => Self::Session(other),
        }
    }
}

impl LivenessError {
    /// The step this error ended, for detection failures and timeouts.
    pub fn failed_action(&self) -> Option<DetectionAction> {
        match self {
            Self::Detection { action, .. } | Self::StepTimedOut { action, .. } => Some(*action),
            _ => None,
        }
    }
}
