//! Media streams, tracks and frames.
//!
//! A [`FrameSource`] stands for the capture device: it broadcasts
//! [`Frame`]s to every stream built on top of it. A [`MediaStream`] is a
//! set of [`MediaTrack`]s reading from one source. Cloning a stream with
//! [`MediaStream::clone_stream`] yields an independent logical copy with
//! its own tracks, so stopping one copy leaves the other running.
//!
//! # Slow readers
//!
//! The source is a `tokio::sync::broadcast` channel. Every reader has its
//! own bounded buffer; a reader that falls behind loses the oldest frames
//! instead of slowing the camera down. For liveness that is the right
//! trade: the engine wants the most recent picture of the user, not a
//! complete recording. [`FrameReceiver`] skips over the gap and carries on.
//!
//! # Stopping
//!
//! Stopping is per track, through a shared flag. A receiver checks its
//! stream's video track before every frame, so stopping the track ends the
//! receiver even though the source keeps producing for other streams.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Which way the camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// Front camera, looking at the user.
    #[default]
    User,
    /// Rear camera.
    Environment,
}

/// What to ask the device for.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaConstraints {
    pub facing_mode: FacingMode,
    /// Width divided by height.
    pub aspect_ratio: f64,
    /// When `true` the device must match `aspect_ratio` exactly.
    pub exact_aspect_ratio: bool,
    pub audio: bool,
}

impl Default for MediaConstraints {
    /// User-facing video at exactly 16:9, no audio.
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::User,
            aspect_ratio: 16.0 / 9.0,
            exact_aspect_ratio: true,
            audio: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One encoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position in the source's output, starting at 0.
    pub seq: u64,
    pub data: Vec<u8>,
}

/// The capture side of a camera: pushes frames to every attached stream.
#[derive(Debug, Clone)]
pub struct FrameSource {
    tx: broadcast::Sender<Frame>,
    next_seq: Arc<AtomicU64>,
}

impl FrameSource {
    /// `capacity` frames are buffered per subscriber before slow readers
    /// start skipping.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes a frame and returns its sequence number.
    ///
    /// Frames published while nobody is subscribed are dropped.
    pub fn push(&self, data: Vec<u8>) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(Frame { seq, data });
        seq
    }

    /// A fresh stream with one live video track (plus an audio track when
    /// requested) reading from this source.
    pub fn stream(&self, with_audio: bool) -> MediaStream {
        let mut tracks = vec![MediaTrack::new(TrackKind::Video)];
        if with_audio {
            tracks.push(MediaTrack::new(TrackKind::Audio));
        }
        MediaStream {
            id: Uuid::new_v4().to_string(),
            tracks,
            source: self.clone(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A handle to one track. Handles are cheap to clone and share the
/// track's stopped flag.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    /// Set once by [`stop`](Self::stop); shared by every clone of the handle.
    stopped: Arc<AtomicBool>,
}

impl MediaTrack {
    fn new(kind: TrackKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stops the track. Returns `true` only for the call that actually
    /// stopped it; stopping a stopped track is a no-op.
    pub fn stop(&self) -> bool {
        let stopped_now = !self.stopped.swap(true, Ordering::AcqRel);
        if stopped_now {
            trace!(track_id = %self.id, kind = ?self.kind, "track stopped");
        }
        stopped_now
    }
}

// ---------------------------------------------------------------------------
// MediaStream
// ---------------------------------------------------------------------------

/// A set of tracks reading from one [`FrameSource`].
#[derive(Debug)]
pub struct MediaStream {
    id: String,
    /// The video track first, then audio if requested.
    tracks: Vec<MediaTrack>,
    /// Shared with the device and with every clone of this stream.
    source: FrameSource,
}

impl MediaStream {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// `true` while at least one track is live.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// An independent copy on the same source, with its own fresh tracks.
    pub fn clone_stream(&self) -> MediaStream {
        let tracks = self
            .tracks
            .iter()
            .map(|track| MediaTrack::new(track.kind))
            .collect();
        let clone = MediaStream {
            id: Uuid::new_v4().to_string(),
            tracks,
            source: self.source.clone(),
        };
        debug!(stream_id = %self.id, clone_id = %clone.id, "stream cloned");
        clone
    }

    /// Stops every track. Returns how many tracks this call stopped, so a
    /// second call returns 0.
    pub fn stop_tracks(&self) -> usize {
        let stopped = self.tracks.iter().filter(|track| track.stop()).count();
        if stopped > 0 {
            debug!(stream_id = %self.id, stopped, "stream tracks stopped");
        }
        stopped
    }

    /// Subscribes to this stream's video frames.
    pub fn frames(&self) -> FrameReceiver {
        FrameReceiver {
            rx: self.source.tx.subscribe(),
            video: self
                .tracks
                .iter()
                .filter(|track| track.kind == TrackKind::Video)
                .cloned()
                .collect(),
        }
    }
}

/// Receives video frames until the stream's video track stops.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: broadcast::Receiver<Frame>,
    video: Vec<MediaTrack>,
}

impl FrameReceiver {
    fn is_live(&self) -> bool {
        self.video.iter().any(MediaTrack::is_live)
    }

    /// The next frame, or `None` once the video track is stopped or the
    /// source is gone. Frames a slow reader missed are skipped.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            if !self.is_live() {
                return None;
            }
            match self.rx.recv().await {
                Ok(frame) => return self.is_live().then_some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, "frame reader lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
