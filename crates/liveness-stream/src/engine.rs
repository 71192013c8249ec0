//! The engine seam: what the orchestrator needs from a liveness engine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use liveness_camera::VideoSurface;
use liveness_protocol::{DetectionAction, StreamAuth};

use crate::EngineError;

/// Called with the action whenever the engine announces a repeat.
pub type RepeatCallback = Arc<dyn Fn(DetectionAction) + Send + Sync>;

/// Per-step detection policy.
#[derive(Clone, Default)]
pub struct DetectOptions {
    /// Let the engine retry the action once after a miss.
    pub retry: bool,
    /// Client-side bound on each attempt. Restarts on every repeat.
    /// `None` waits as long as the engine takes.
    pub timeout: Option<Duration>,
    pub on_repeat: Option<RepeatCallback>,
}

impl DetectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_repeat(mut self, callback: impl Fn(DetectionAction) + Send + Sync + 'static) -> Self {
        self.on_repeat = Some(Arc::new(callback));
        self
    }

    pub(crate) fn notify_repeat(&self, action: DetectionAction) {
        if let Some(callback) = &self.on_repeat {
            callback(action);
        }
    }
}

impl fmt::Debug for DetectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectOptions")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("on_repeat", &self.on_repeat.is_some())
            .finish()
    }
}

/// A remote liveness engine reached over a persistent connection.
///
/// One connection at a time: `open`, any number of `detect` calls, then
/// `close`. Implemented by [`WsLivenessEngine`](crate::WsLivenessEngine)
/// and by test doubles.
pub trait LivenessEngine: Send + Sync + 'static {
    /// Connects to `url`, authenticates with `auth` and starts uploading
    /// the frames attached to `surface`.
    ///
    /// A failed open may leave a half-open connection behind; callers
    /// must still [`close`](Self::close).
    ///
    /// # Errors
    /// [`EngineError::NoVideo`], [`EngineError::Connect`],
    /// [`EngineError::Rejected`], [`EngineError::HandshakeTimedOut`], or a
    /// transport/protocol error during the handshake.
    fn open(
        &self,
        url: &str,
        surface: &VideoSurface,
        auth: &StreamAuth,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Runs one detection step and resolves with the engine's verdict.
    ///
    /// # Errors
    /// [`EngineError::DetectionFailed`] or
    /// [`EngineError::DetectionTimedOut`] for a negative verdict; anything
    /// else means the connection itself broke.
    fn detect(
        &self,
        action: DetectionAction,
        options: DetectOptions,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Tears the connection down. Safe to call at any time, any number of
    /// times; failures are logged, not returned.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_detect_options_builder_sets_fields() {
        let options = DetectOptions::new()
            .retry(true)
            .timeout(Duration::from_secs(15));

        assert!(options.retry);
        assert_eq!(options.timeout, Some(Duration::from_secs(15)));
        assert!(options.on_repeat.is_none());
    }

    #[test]
    fn test_notify_repeat_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let options = DetectOptions::new().on_repeat(move |action| {
            assert_eq!(action, DetectionAction::Smile);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        options.notify_repeat(DetectionAction::Smile);
        options.notify_repeat(DetectionAction::Smile);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_notify_repeat_without_callback_is_noop() {
        DetectOptions::new().notify_repeat(DetectionAction::Face);
    }

    #[test]
    fn test_debug_hides_callback() {
        let printed = format!("{:?}", DetectOptions::new().on_repeat(|_| {}));
        assert!(printed.contains("on_repeat: true"));
    }
}
