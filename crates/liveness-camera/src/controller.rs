//! Camera acquisition and the preview/streaming stream pair.
//!
//! [`CameraController`] is an explicit `mount()`/`unmount()` resource pair:
//!
//! - `mount()` requests the camera at most once per controller, attaches
//!   the raw stream to the preview surface and a clone to the streaming
//!   surface, and starts playback on the streaming surface when its first
//!   frame arrives.
//! - `unmount()` stops both streams and clears both surfaces. It runs on
//!   drop too, so every exit path releases the device.
//!
//! # Two surfaces, one device
//!
//! The preview surface shows the user what the camera sees. The streaming
//! surface feeds the liveness engine. Both are backed by the same capture
//! source: the streaming stream is a clone of the preview stream with its
//! own track handles, so either side can be stopped without reaching into
//! the other's tracks.
//!
//! ```text
//!                     ┌──▶ preview stream   ──▶ preview surface
//!  CameraDevice ──────┤
//!   (FrameSource)     └──▶ streaming clone  ──▶ streaming surface ──▶ engine
//! ```
//!
//! # Failure model
//!
//! Camera problems never surface as errors from this module. The device's
//! [`CameraError`] is logged and collapses into
//! [`PermissionState::Denied`], which is what the start control reads.

use std::fmt;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{CameraError, MediaConstraints, MediaStream, VideoSurface};

// ---------------------------------------------------------------------------
// Device seam
// ---------------------------------------------------------------------------

/// Something that can hand out a camera stream.
///
/// The real capture device lives outside this crate; tests and the demo
/// provide their own.
pub trait CameraDevice: Send + Sync + 'static {
    /// Opens the camera with `constraints`.
    ///
    /// # Errors
    /// Any [`CameraError`]: permission refusal, no matching device, or a
    /// device that fails to open.
    fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> impl Future<Output = Result<MediaStream, CameraError>> + Send;
}

/// Result of asking for the camera. Failures carry no detail; they have
/// already been logged.
#[derive(Debug)]
pub enum CameraOutcome {
    Success(MediaStream),
    Failed,
}

/// Asks `device` for a stream. Never fails: errors are logged and turned
/// into [`CameraOutcome::Failed`].
pub async fn request_camera<D: CameraDevice>(
    device: &D,
    constraints: &MediaConstraints,
) -> CameraOutcome {
    match device.acquire(constraints).await {
        Ok(stream) => {
            info!(
                stream_id = %stream.id(),
                tracks = stream.tracks().len(),
                "camera acquired"
            );
            CameraOutcome::Success(stream)
        }
        Err(e) => {
            warn!(error = %e, "camera request failed");
            CameraOutcome::Failed
        }
    }
}

// ---------------------------------------------------------------------------
// Permission state
// ---------------------------------------------------------------------------

/// Whether camera access has been granted. Starting a liveness check is
/// only allowed once this is `Granted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// The camera has not been requested yet.
    #[default]
    Unknown,
    /// A stream was acquired and attached to both surfaces.
    Granted,
    /// The request failed, for whatever reason. There is no second request.
    Denied,
}

impl PermissionState {
    /// `true` only for [`Granted`](Self::Granted).
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Granted => write!(f, "Granted"),
            Self::Denied => write!(f, "Denied"),
        }
    }
}

// ---------------------------------------------------------------------------
// CameraController
// ---------------------------------------------------------------------------

/// Owns the camera for the lifetime of one liveness screen.
///
/// ## Lifecycle
///
/// ```text
/// new() ──▶ mount() ──▶ [Granted: both surfaces live] ──▶ unmount() / drop
///              │
///              └──▶ [Denied: nothing attached]
/// ```
///
/// `mount` is guarded by a flag that is never reset, so a controller asks
/// the device at most once. Create a new controller to ask again.
pub struct CameraController<D: CameraDevice> {
    /// Where streams come from.
    device: D,
    /// Constraints passed to every acquisition.
    constraints: MediaConstraints,
    /// Shows the raw stream to the user.
    preview: VideoSurface,
    /// Carries the clone uploaded to the liveness engine.
    streaming: VideoSurface,
    permission: PermissionState,
    /// Set on the first `mount()`; never reset.
    requested: bool,
    /// Waits for the first streaming frame, then marks the surface playing.
    playback: Option<JoinHandle<()>>,
}

impl<D: CameraDevice> CameraController<D> {
    /// Creates a controller with the default constraints and two fresh
    /// surfaces.
    pub fn new(device: D) -> Self {
        Self::with_surfaces(
            device,
            MediaConstraints::default(),
            VideoSurface::new("preview"),
            VideoSurface::new("streaming"),
        )
    }

    /// Creates a controller over caller-supplied surfaces.
    ///
    /// Surfaces are cheap handles, so the caller can keep clones of them
    /// (for instance to hand the streaming surface to the orchestrator).
    pub fn with_surfaces(
        device: D,
        constraints: MediaConstraints,
        preview: VideoSurface,
        streaming: VideoSurface,
    ) -> Self {
        Self {
            device,
            constraints,
            preview,
            streaming,
            permission: PermissionState::Unknown,
            requested: false,
            playback: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// The permission reached by the first `mount`, or `Unknown` before it.
    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn preview_surface(&self) -> &VideoSurface {
        &self.preview
    }

    /// The surface whose frames go to the liveness engine.
    pub fn streaming_surface(&self) -> &VideoSurface {
        &self.streaming
    }

    /// `true` while either surface still holds a stream.
    pub fn is_mounted(&self) -> bool {
        self.preview.has_stream() || self.streaming.has_stream()
    }

    /// Acquires the camera and wires up both surfaces.
    ///
    /// Only the first call talks to the device; later calls return the
    /// permission state reached by the first.
    pub async fn mount(&mut self) -> PermissionState {
        if self.requested {
            debug!(permission = %self.permission, "camera already requested");
            return self.permission;
        }
        self.requested = true;

        match request_camera(&self.device, &self.constraints).await {
            CameraOutcome::Success(stream) => {
                let clone = stream.clone_stream();
                let clone_id = clone.id().to_string();
                self.preview.attach(stream);
                self.streaming.attach(clone);
                self.playback = Some(self.spawn_playback(clone_id));
                self.permission = PermissionState::Granted;
            }
            CameraOutcome::Failed => {
                self.permission = PermissionState::Denied;
            }
        }

        info!(permission = %self.permission, "camera mounted");
        self.permission
    }

    /// Starts playback on the streaming surface once its first frame is
    /// available.
    fn spawn_playback(&self, stream_id: String) -> JoinHandle<()> {
        let surface = self.streaming.clone();
        let frames = surface.frames();
        tokio::spawn(async move {
            let Some(mut frames) = frames else {
                return;
            };
            let Some(first) = frames.recv().await else {
                return;
            };
            if surface.mark_playing(&stream_id) {
                debug!(
                    surface = surface.name(),
                    first_seq = first.seq,
                    "streaming surface playing"
                );
            }
        })
    }

    /// Stops both streams and clears both surfaces.
    ///
    /// Returns `true` if anything was torn down. With nothing attached it
    /// does nothing, so calling it twice is safe.
    pub fn unmount(&mut self) -> bool {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }

        let mut released = false;
        let mut stopped = 0;
        for surface in [&self.preview, &self.streaming] {
            if let Some(stream) = surface.detach() {
                released = true;
                stopped += stream.stop_tracks();
            }
        }

        if released {
            info!(tracks_stopped = stopped, "camera released");
        }
        released
    }
}

impl<D: CameraDevice> Drop for CameraController<D> {
    fn drop(&mut self) {
        self.unmount();
    }
}
