//! Single cancellable step watchdog for the liveness flow.
//!
//! A [`LivenessTimer`] holds at most one pending deadline. Arming it again
//! replaces the previous deadline; clearing it is idempotent and clearing
//! a timer that has already fired is a no-op.
//!
//! # Integration
//!
//! The timer is designed to race a detection call inside `tokio::select!`:
//!
//! ```ignore
//! timer.arm(step_budget);
//! let outcome = tokio::select! {
//!     result = engine.detect(action, options) => Some(result),
//!     budget = timer.expired() => None,
//! };
//! timer.clear();
//! ```
//!
//! When nothing is armed, [`LivenessTimer::expired`] pends forever, so the
//! other `select!` branches decide the outcome.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// At most one pending timeout.
///
/// Built on Tokio's clock, so tests can drive it with
/// `#[tokio::test(start_paused = true)]`.
#[derive(Debug, Default)]
pub struct LivenessTimer {
    /// Deadline and the duration it was armed with.
    pending: Option<(Instant, Duration)>,
    /// How many times the timer has fired since creation.
    fired: u64,
}

impl LivenessTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `after` from now, replacing any pending
    /// deadline.
    pub fn arm(&mut self, after: Duration) {
        if self.pending.is_some() {
            trace!("replacing pending deadline");
        }
        self.pending = Some((Instant::now() + after, after));
        debug!(after_ms = after.as_millis() as u64, "timer armed");
    }

    /// Cancels the pending deadline.
    ///
    /// Returns `true` if a deadline was actually cancelled. Calling it on
    /// a cleared or already-fired timer does nothing and returns `false`.
    pub fn clear(&mut self) -> bool {
        let cleared = self.pending.take().is_some();
        if cleared {
            trace!("timer cleared");
        }
        cleared
    }

    /// `true` while a deadline is pending.
    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left until the pending deadline, `None` when not armed.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .map(|(deadline, _)| deadline.saturating_duration_since(Instant::now()))
    }

    /// How many times the timer has fired.
    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    /// Waits for the pending deadline and returns the duration the timer
    /// was armed with. The timer is cleared once it fires.
    ///
    /// Pends forever when nothing is armed. Cancel-safe: dropping the
    /// future before it resolves leaves the deadline in place.
    pub async fn expired(&mut self) -> Duration {
        let Some((deadline, armed_for)) = self.pending else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        self.pending = None;
        self.fired += 1;
        debug!(after_ms = armed_for.as_millis() as u64, "timer fired");
        armed_for
    }
}
