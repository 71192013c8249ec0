//! # Liveness
//!
//! Client for a camera-based liveness check.
//!
//! The flow acquires the camera, negotiates a session with the remote
//! service, streams video to the liveness engine and walks the user
//! through the face and smile steps. Each layer lives in its own crate;
//! this crate ties them together in [`LivenessOrchestrator`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use liveness::prelude::*;
//!
//! # async fn run<D: CameraDevice>(device: D) -> Result<(), LivenessError> {
//! let config = LivenessConfig::from_env()?;
//!
//! let mut camera = CameraController::new(device);
//! let permission = camera.mount().await;
//!
//! let auth = Arc::new(AuthClient::new(ReqwestTransport::new(), config.auth));
//! let sessions = SessionClient::new(auth, config.session);
//! let mut orchestrator = LivenessOrchestrator::new(
//!     sessions,
//!     WsLivenessEngine::new(),
//!     config.orchestrator,
//!     camera.streaming_surface().clone(),
//! );
//!
//! orchestrator.on_permission(permission);
//! let status = orchestrator.start().await?;
//! assert!(status.face_detected && status.smile_detected);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod orchestrator;
mod state;

pub use config::{
    ConfigError, ENV_API_KEY, ENV_AUTH_URL, ENV_ENGINE_URL, ENV_SCOPE, ENV_STEP_BUDGET_SECS,
    ENV_STREAMING_URL, LivenessConfig, OrchestratorConfig,
};
pub use error::LivenessError;
pub use orchestrator::LivenessOrchestrator;
pub use state::{DetectionStatus, DetectionStep, OrchestratorState};

/// Re-exports of commonly used types.
///
/// ```rust
/// use liveness::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ConfigError, DetectionStatus, DetectionStep, LivenessConfig, LivenessError,
        LivenessOrchestrator, OrchestratorConfig, OrchestratorState,
    };

    pub use liveness_camera::{
        CameraController, CameraDevice, CameraError, CameraOutcome, FrameSource,
        MediaConstraints, MediaStream, MediaTrack, PermissionState, VideoSurface,
    };
    pub use liveness_protocol::{DetectionAction, StreamAuth};
    pub use liveness_session::{
        AuthClient, AuthConfig, Session, SessionClient, SessionClientConfig, SessionProvider,
    };
    pub use liveness_stream::{DetectOptions, EngineError, LivenessEngine, WsLivenessEngine};
    pub use liveness_transport::{HttpTransport, ReqwestTransport};
}
