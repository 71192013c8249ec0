//! Error types for camera acquisition.

/// Why the camera could not be acquired.
///
/// These never escape [`request_camera`](crate::request_camera); they are
/// logged and turned into [`CameraOutcome::Failed`](crate::CameraOutcome).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// The user (or platform policy) refused access.
    #[error("camera permission denied")]
    PermissionDenied,

    /// No device satisfies the requested constraints.
    #[error("no camera satisfies the constraints: {0}")]
    Overconstrained(String),

    /// The device exists but could not be opened.
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}
