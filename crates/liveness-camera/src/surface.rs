//! Video surfaces: where a stream is attached for display or upload.
//!
//! A surface is the stand-in for a `<video>` element. It holds at most one
//! [`MediaStream`] and a `playing` flag. Attaching or detaching always
//! clears the flag; only the controller sets it again, and only for the
//! stream that is still attached when playback starts. A slow `play` that
//! finishes after the stream was swapped therefore cannot mark the new
//! stream as playing.
//!
//! ```text
//!   attach(s1) ──▶ playing=false ──▶ mark_playing("s1") ──▶ playing=true
//!                                          │
//!   attach(s2) before it lands ────────────┘ returns false, flag stays
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{FrameReceiver, MediaStream};

#[derive(Debug, Default)]
struct SurfaceState {
    stream: Option<MediaStream>,
    playing: bool,
}

/// A shared handle to a rendering target.
///
/// Cloning the handle does not clone the surface: every clone sees the
/// same attached stream. The controller attaches streams; the streaming
/// engine reads frames from whatever is attached.
#[derive(Debug, Clone, Default)]
pub struct VideoSurface {
    /// Label used in logs, e.g. `"preview"` or `"streaming"`.
    name: &'static str,
    state: Arc<Mutex<SurfaceState>>,
}

impl VideoSurface {
    /// Creates an empty surface.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        // A panic while holding the lock cannot leave the state half
        // written, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attaches `stream`, returning whatever was attached before.
    pub fn attach(&self, stream: MediaStream) -> Option<MediaStream> {
        let mut state = self.lock();
        state.playing = false;
        state.stream.replace(stream)
    }

    /// Clears the surface's stream reference.
    pub fn detach(&self) -> Option<MediaStream> {
        let mut state = self.lock();
        state.playing = false;
        state.stream.take()
    }

    pub fn has_stream(&self) -> bool {
        self.lock().stream.is_some()
    }

    /// Id of the attached stream.
    pub fn stream_id(&self) -> Option<String> {
        self.lock().stream.as_ref().map(|s| s.id().to_string())
    }

    /// `true` while a live stream is attached.
    pub fn is_live(&self) -> bool {
        self.lock().stream.as_ref().is_some_and(MediaStream::is_active)
    }

    /// Subscribes to the attached stream's frames.
    pub fn frames(&self) -> Option<FrameReceiver> {
        self.lock().stream.as_ref().map(MediaStream::frames)
    }

    /// `true` once playback started for the currently attached stream.
    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// Marks playback as started, only if `stream_id` is still attached.
    pub(crate) fn mark_playing(&self, stream_id: &str) -> bool {
        let mut state = self.lock();
        let attached = state.stream.as_ref().is_some_and(|s| s.id() == stream_id);
        if attached {
            state.playing = true;
        }
        attached
    }
}
