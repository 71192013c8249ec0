//! Orchestrator state machine, detection steps and the status display.

use std::fmt;
use std::time::Duration;

use liveness_protocol::DetectionAction;
use liveness_stream::DetectOptions;
use serde::Serialize;

// ---------------------------------------------------------------------------
// OrchestratorState
// ---------------------------------------------------------------------------

/// Where one liveness attempt stands.
///
/// The happy path is strictly ordered, no skipping states:
///
/// ```text
/// Idle → SessionPending → ConnectionOpen → DetectingFace → DetectingSmile → Completed
///            │                 │                │               │
///            └─────────────────┴───── Aborted ──┴───────────────┘
/// ```
///
/// - **Idle**: nothing in flight. A start command is accepted once camera
///   permission is granted.
/// - **SessionPending**: credentials and a remote session are being
///   negotiated.
/// - **ConnectionOpen**: the engine accepted the session and video is
///   flowing.
/// - **DetectingFace** / **DetectingSmile**: one detection step each.
/// - **Completed**: every step passed. Terminal.
/// - **Aborted**: something failed or timed out. Terminal.
///
/// A terminal attempt can be followed by a fresh one, which starts again
/// from `Idle` with a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrchestratorState {
    Idle,
    SessionPending,
    ConnectionOpen,
    DetectingFace,
    DetectingSmile,
    Completed,
    Aborted,
}

impl OrchestratorState {
    /// The next state on the happy path. `None` for terminal states.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::SessionPending),
            Self::SessionPending => Some(Self::ConnectionOpen),
            Self::ConnectionOpen => Some(Self::DetectingFace),
            Self::DetectingFace => Some(Self::DetectingSmile),
            Self::DetectingSmile => Some(Self::Completed),
            Self::Completed | Self::Aborted => None,
        }
    }

    /// `true` for `Completed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// `true` while an attempt is underway (anything but `Idle` and the
    /// terminal states).
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal() && self != Self::Idle
    }

    /// Returns `true` if transitioning to `target` is valid: the next
    /// happy-path state, or `Aborted` from any in-flight state.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Aborted && self.is_in_flight())
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::SessionPending => write!(f, "SessionPending"),
            Self::ConnectionOpen => write!(f, "ConnectionOpen"),
            Self::DetectingFace => write!(f, "DetectingFace"),
            Self::DetectingSmile => write!(f, "DetectingSmile"),
            Self::Completed => write!(f, "Completed"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

// ---------------------------------------------------------------------------
// DetectionStep
// ---------------------------------------------------------------------------

/// One step of the detection sequence and its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionStep {
    pub action: DetectionAction,
    /// Whether the engine may retry the action once.
    pub retry: bool,
    /// Per-attempt timeout handed to the engine.
    pub timeout: Duration,
}

impl DetectionStep {
    /// A step that allows one engine retry, with each attempt bounded by
    /// half of `budget` so both attempts fit inside it.
    pub fn retryable(action: DetectionAction, budget: Duration) -> Self {
        Self {
            action,
            retry: true,
            timeout: budget / 2,
        }
    }

    pub fn options(&self) -> DetectOptions {
        DetectOptions::new().retry(self.retry).timeout(self.timeout)
    }

    /// The state the orchestrator is in while this step runs.
    ///
    /// `None` for head turns: the engine understands them, but the
    /// orchestrator has no state for them and never schedules them.
    pub fn state(&self) -> Option<OrchestratorState> {
        match self.action {
            DetectionAction::Face => Some(OrchestratorState::DetectingFace),
            DetectionAction::Smile => Some(OrchestratorState::DetectingSmile),
            DetectionAction::HeadLeft | DetectionAction::HeadRight => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DetectionStatus
// ---------------------------------------------------------------------------

/// What the status display shows for the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DetectionStatus {
    pub face_detected: bool,
    pub smile_detected: bool,
    /// How many times the engine asked the user to repeat an action.
    pub repeats: u32,
}

impl DetectionStatus {
    pub(crate) fn mark_detected(&mut self, action: DetectionAction) {
        match action {
            DetectionAction::Face => self.face_detected = true,
            DetectionAction::Smile => self.smile_detected = true,
            DetectionAction::HeadLeft | DetectionAction::HeadRight => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrchestratorState; 7] = [
        OrchestratorState::Idle,
        OrchestratorState::SessionPending,
        OrchestratorState::ConnectionOpen,
        OrchestratorState::DetectingFace,
        OrchestratorState::DetectingSmile,
        OrchestratorState::Completed,
        OrchestratorState::Aborted,
    ];

    // =====================================================================
    // OrchestratorState
    // =====================================================================

    #[test]
    fn test_next_follows_strict_order() {
        use OrchestratorState::*;
        assert_eq!(Idle.next(), Some(SessionPending));
        assert_eq!(SessionPending.next(), Some(ConnectionOpen));
        assert_eq!(ConnectionOpen.next(), Some(DetectingFace));
        assert_eq!(DetectingFace.next(), Some(DetectingSmile));
        assert_eq!(DetectingSmile.next(), Some(Completed));
        assert_eq!(Completed.next(), None);
        assert_eq!(Aborted.next(), None);
    }

    #[test]
    fn test_can_transition_to_no_skipping() {
        use OrchestratorState::*;
        assert!(!Idle.can_transition_to(ConnectionOpen));
        assert!(!SessionPending.can_transition_to(DetectingFace));
        assert!(!ConnectionOpen.can_transition_to(DetectingSmile));
        assert!(!DetectingFace.can_transition_to(Completed));
    }

    #[test]
    fn test_can_transition_to_aborted_only_from_in_flight() {
        use OrchestratorState::*;
        for state in [SessionPending, ConnectionOpen, DetectingFace, DetectingSmile] {
            assert!(state.can_transition_to(Aborted), "{state} should abort");
        }
        for state in [Idle, Completed, Aborted] {
            assert!(!state.can_transition_to(Aborted), "{state} should not abort");
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [OrchestratorState::Completed, OrchestratorState::Aborted] {
            assert!(from.is_terminal());
            assert!(ALL.iter().all(|&to| !from.can_transition_to(to)));
        }
    }

    #[test]
    fn test_is_in_flight_excludes_idle_and_terminal() {
        let in_flight: Vec<_> = ALL.into_iter().filter(|s| s.is_in_flight()).collect();
        assert_eq!(in_flight.len(), 4);
        assert!(!OrchestratorState::Idle.is_in_flight());
    }

    #[test]
    fn test_display_matches_variant_name() {
        assert_eq!(OrchestratorState::DetectingSmile.to_string(), "DetectingSmile");
        assert_eq!(format!("{:?}", OrchestratorState::Aborted), "Aborted");
    }

    // =====================================================================
    // DetectionStep
    // =====================================================================

    #[test]
    fn test_retryable_halves_budget() {
        let step = DetectionStep::retryable(DetectionAction::Face, Duration::from_secs(30));
        assert!(step.retry);
        assert_eq!(step.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_options_carry_step_policy() {
        let step = DetectionStep::retryable(DetectionAction::Smile, Duration::from_secs(30));
        let options = step.options();
        assert!(options.retry);
        assert_eq!(options.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_step_state_maps_action() {
        let face = DetectionStep::retryable(DetectionAction::Face, Duration::from_secs(2));
        let smile = DetectionStep::retryable(DetectionAction::Smile, Duration::from_secs(2));
        assert_eq!(face.state(), Some(OrchestratorState::DetectingFace));
        assert_eq!(smile.state(), Some(OrchestratorState::DetectingSmile));
    }

    #[test]
    fn test_step_state_head_turns_have_no_state() {
        for action in [DetectionAction::HeadLeft, DetectionAction::HeadRight] {
            let step = DetectionStep::retryable(action, Duration::from_secs(2));
            assert_eq!(step.state(), None, "{action} must not pose as a smile step");
        }
    }

    // =====================================================================
    // DetectionStatus
    // =====================================================================

    #[test]
    fn test_mark_detected_sets_matching_flag() {
        let mut status = DetectionStatus::default();
        status.mark_detected(DetectionAction::Face);
        assert!(status.face_detected);
        assert!(!status.smile_detected);

        status.mark_detected(DetectionAction::HeadLeft);
        assert!(!status.smile_detected);
    }

    #[test]
    fn test_status_serializes_for_display() {
        let status = DetectionStatus {
            face_detected: true,
            smile_detected: false,
            repeats: 1,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"face_detected": true, "smile_detected": false, "repeats": 1})
        );
    }
}
