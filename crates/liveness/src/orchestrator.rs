//! The liveness orchestrator: session, connection, detection steps.
//!
//! This is the top of the stack. It owns nothing that talks to the network
//! directly; instead it drives two collaborators through their traits:
//!
//! - a [`SessionProvider`], which turns a credential into a fresh session
//!   (`session_id` plus a locally generated transaction id), and
//! - a [`LivenessEngine`], which opens the streaming connection, runs one
//!   detection at a time and closes the connection again.
//!
//! Both are generic parameters, so tests plug in scripted doubles and
//! production plugs in `SessionClient` and `WsLivenessEngine`.
//!
//! # One attempt
//!
//! One call to [`LivenessOrchestrator::start`] runs one attempt to its
//! end:
//!
//! ```text
//!  Idle ─▶ SessionPending ─▶ ConnectionOpen ─▶ DetectingFace ─▶ DetectingSmile ─▶ Completed
//!                │                 │                 │                 │
//!                └─────────────────┴────────┬────────┴─────────────────┘
//!                                           ▼ any failure
//!                                        Aborted
//! ```
//!
//! 1. Ask the [`SessionProvider`] for a fresh session.
//! 2. Open the engine connection bound to the streaming surface.
//! 3. Run the face step, then the smile step. Each step races the
//!    engine's verdict against the local step watchdog.
//! 4. Close the connection, whatever happened.
//!
//! There is no retry at this level. The engine may repeat an action once
//! inside a step; the orchestrator only counts those repeats. A new
//! `start` after a terminal state begins a new attempt with a new session.
//!
//! # The step watchdog
//!
//! Each step hands the engine a per-attempt timeout of half the step
//! budget, and the engine enforces it. The orchestrator does not rely on
//! that alone: it also arms a [`LivenessTimer`] with the full budget and
//! `select!`s the detect call against it. An engine that never answers at
//! all still cannot hold a step longer than the budget.
//!
//! # Exactly one close
//!
//! `start` closes the engine once, after the attempt returns, on the
//! success path and on every failure path alike. `run_attempt` itself never
//! closes, so early returns through `?` cannot skip or double the close.
//!
//! # Cancellation
//!
//! `start` borrows the orchestrator mutably, so dropping its future (for
//! example when a `select!` against Ctrl-C wins) leaves the state machine
//! mid-flight with a connection possibly open. [`LivenessOrchestrator::abort`]
//! finishes that teardown, and the next `start` calls it first. If the
//! whole orchestrator is dropped instead, the engine's own drop releases
//! the connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use liveness_camera::{PermissionState, VideoSurface};
use liveness_protocol::DetectionAction;
use liveness_session::{Session, SessionProvider};
use liveness_stream::LivenessEngine;
use liveness_timer::LivenessTimer;
use tracing::{debug, error, info, warn};

use crate::{DetectionStatus, DetectionStep, LivenessError, OrchestratorConfig, OrchestratorState};

/// Drives one liveness attempt at a time.
///
/// Created once per check screen, next to the camera controller that feeds
/// its streaming surface. It stays usable after an attempt ends: call
/// `start` again for a fresh attempt.
pub struct LivenessOrchestrator<S: SessionProvider, E: LivenessEngine> {
    /// Source of fresh sessions, one per attempt.
    sessions: S,
    /// The remote liveness engine. At most one connection is open at a time.
    engine: E,
    /// Engine URL and step budget, already validated.
    config: OrchestratorConfig,
    /// Surface whose frames are uploaded to the engine.
    streaming: VideoSurface,
    /// Last reported camera permission. `start` is refused until granted.
    permission: PermissionState,
    state: OrchestratorState,
    /// States visited by the current attempt, starting at `Idle`.
    trace: Vec<OrchestratorState>,
    /// Step watchdog. Armed only while a detection step is running.
    timer: LivenessTimer,
    /// Which steps passed in the current attempt.
    status: DetectionStatus,
    /// Shared with the engine's repeat callback.
    repeats: Arc<AtomicU32>,
    session: Option<Session>,
}

impl<S: SessionProvider, E: LivenessEngine> LivenessOrchestrator<S, E> {
    /// Creates an idle orchestrator.
    ///
    /// `streaming` is the surface whose stream is uploaded to the engine;
    /// pass the camera controller's streaming surface. Permission starts
    /// out [`PermissionState::Unknown`] until [`on_permission`](Self::on_permission)
    /// reports the camera outcome.
    pub fn new(
        sessions: S,
        engine: E,
        config: OrchestratorConfig,
        streaming: VideoSurface,
    ) -> Self {
        Self {
            sessions,
            engine,
            config: config.validated(),
            streaming,
            permission: PermissionState::Unknown,
            state: OrchestratorState::Idle,
            trace: vec![OrchestratorState::Idle],
            timer: LivenessTimer::new(),
            status: DetectionStatus::default(),
            repeats: Arc::new(AtomicU32::new(0)),
            session: None,
        }
    }

    // -- Accessors ----------------------------------------------------------

    /// Current state of the state machine.
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// States visited by the current (or last) attempt, in order.
    pub fn trace(&self) -> &[OrchestratorState] {
        &self.trace
    }

    /// What the status display should show: which steps passed and how
    /// many repeats the engine asked for.
    pub fn status(&self) -> DetectionStatus {
        DetectionStatus {
            repeats: self.repeats.load(Ordering::Relaxed),
            ..self.status
        }
    }

    /// Session of the current (or last) attempt.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    /// `true` when a start command would be accepted.
    pub fn can_start(&self) -> bool {
        self.permission.is_granted() && !self.state.is_in_flight()
    }

    /// `true` while the step watchdog is armed.
    pub fn timer_active(&self) -> bool {
        self.timer.is_active()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    // -- Events -------------------------------------------------------------

    /// Records the outcome of the camera request.
    ///
    /// This is the explicit "permission granted" event. Until it reports
    /// [`PermissionState::Granted`], `start` answers
    /// [`LivenessError::NotReady`] without touching the network.
    pub fn on_permission(&mut self, permission: PermissionState) {
        if self.permission != permission {
            info!(from = %self.permission, to = %permission, "camera permission changed");
        }
        self.permission = permission;
    }

    /// Runs one full attempt and returns the final status.
    ///
    /// The connection is closed exactly once on every path after the
    /// permission check, and the step watchdog is never left armed.
    ///
    /// # Errors
    /// - [`LivenessError::NotReady`] if camera permission is not granted.
    ///   Nothing else happens in that case.
    /// - Any session, connection, detection or watchdog failure; the
    ///   attempt ends in [`OrchestratorState::Aborted`].
    pub async fn start(&mut self) -> Result<DetectionStatus, LivenessError> {
        if !self.permission.is_granted() {
            warn!(permission = %self.permission, "start ignored until camera permission is granted");
            return Err(LivenessError::NotReady);
        }

        // A previous start was dropped mid-flight; finish tearing it down.
        self.abort().await;
        self.reset();

        let result = self.run_attempt().await;
        self.timer.clear();
        self.engine.close().await;

        match &result {
            Ok(()) => {
                self.transition(OrchestratorState::Completed);
                info!(status = ?self.status(), "liveness check completed");
            }
            Err(e) => {
                self.transition(OrchestratorState::Aborted);
                error!(error = %e, trace = ?self.trace, "liveness check aborted");
            }
        }
        result.map(|()| self.status())
    }

    /// Tears down an attempt whose `start` future was dropped before it
    /// finished: clears the watchdog, closes the connection and marks the
    /// attempt `Aborted`.
    ///
    /// Returns `false` (and does nothing) when no attempt is in flight.
    pub async fn abort(&mut self) -> bool {
        if !self.state.is_in_flight() {
            return false;
        }
        warn!(state = %self.state, "aborting interrupted attempt");
        self.timer.clear();
        self.engine.close().await;
        self.transition(OrchestratorState::Aborted);
        true
    }

    // -- Attempt ------------------------------------------------------------

    /// Forgets everything about the previous attempt.
    fn reset(&mut self) {
        self.state = OrchestratorState::Idle;
        self.trace.clear();
        self.trace.push(OrchestratorState::Idle);
        self.status = DetectionStatus::default();
        self.repeats.store(0, Ordering::Relaxed);
        self.session = None;
    }

    /// Moves to `next` and records it in the trace. Invalid transitions are
    /// a bug in this module, so they only trip a debug assertion.
    fn transition(&mut self, next: OrchestratorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {next}",
            self.state
        );
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        self.trace.push(next);
    }

    /// The fixed step plan: face, then smile, both retryable within the
    /// configured budget.
    fn steps(&self) -> [DetectionStep; 2] {
        let budget = self.config.step_budget;
        [
            DetectionStep::retryable(DetectionAction::Face, budget),
            DetectionStep::retryable(DetectionAction::Smile, budget),
        ]
    }

    /// Session, connection and both steps. Stops at the first failure and
    /// leaves the close to the caller.
    async fn run_attempt(&mut self) -> Result<(), LivenessError> {
        self.transition(OrchestratorState::SessionPending);
        let session = self.sessions.create_session().await?;
        let auth = session.stream_auth();
        info!(
            session_id = %session.session_id,
            transaction_id = %session.transaction_id,
            "session ready"
        );
        self.session = Some(session);

        self.engine
            .open(&self.config.engine_url, &self.streaming, &auth)
            .await
            .map_err(LivenessError::Connection)?;
        self.transition(OrchestratorState::ConnectionOpen);

        for step in self.steps() {
            if let Some(state) = step.state() {
                self.transition(state);
            }
            self.run_step(step).await?;
            self.status.mark_detected(step.action);
            info!(action = %step.action, "step passed");
        }
        Ok(())
    }

    /// Runs one step under the watchdog. The watchdog is cleared on exit.
    async fn run_step(&mut self, step: DetectionStep) -> Result<(), LivenessError> {
        let action = step.action;
        let repeats = Arc::clone(&self.repeats);
        let options = step.options().on_repeat(move |action| {
            let total = repeats.fetch_add(1, Ordering::Relaxed) + 1;
            info!(%action, repeats = total, "engine asked to repeat the action");
        });

        self.timer.arm(self.config.step_budget);
        let outcome = tokio::select! {
            result = self.engine.detect(action, options) => {
                result.map_err(|source| LivenessError::Detection { action, source })
            }
            budget = self.timer.expired() => {
                warn!(%action, budget_secs = budget.as_secs(), "step watchdog fired");
                Err(LivenessError::StepTimedOut { action, budget })
            }
        };
        self.timer.clear();
        outcome
    }
}
