//! Wire types for the liveness client.
//!
//! Two families live here:
//!
//! - **HTTP DTOs** for the token and session endpoints
//!   ([`TokenResponse`], [`CreateSessionRequest`], [`CreateSessionResponse`]).
//! - **Streaming messages** exchanged with the liveness engine over the
//!   persistent connection ([`ClientMessage`], [`EngineMessage`]).
//!
//! Field names match the remote services exactly (`access_token`,
//! `tx_id`, `session_id`), so the serde derives need no renames beyond
//! the enum tags.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Detection actions
// ---------------------------------------------------------------------------

/// One liveness challenge the engine knows how to detect.
///
/// `HeadLeft` and `HeadRight` are part of the engine's surface but the
/// client flow only ever asks for `Face` then `Smile`.
///
/// `#[serde(rename_all = "snake_case")]` gives `"face"`, `"smile"`,
/// `"head_left"`, `"head_right"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionAction {
    Face,
    Smile,
    HeadLeft,
    HeadRight,
}

impl DetectionAction {
    /// The wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Smile => "smile",
            Self::HeadLeft => "head_left",
            Self::HeadRight => "head_right",
        }
    }
}

impl fmt::Display for DetectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HTTP DTOs
// ---------------------------------------------------------------------------

/// Body returned by the OAuth token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime of the token in seconds, counted from issuance.
    pub expires_in: u64,
}

/// Body sent to the session-creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Locally generated correlation id for this attempt.
    pub tx_id: String,
}

/// Body returned by the session-creation endpoint on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// Streaming connection auth
// ---------------------------------------------------------------------------

/// Credentials presented when opening the streaming connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAuth {
    pub session_id: String,
    pub tx_id: String,
}

// ---------------------------------------------------------------------------
// Streaming messages
// ---------------------------------------------------------------------------

/// Client → engine control messages. Sent as text frames.
///
/// Internally tagged: `{ "type": "detect", "action": "face", ... }`.
/// Video frames do not go through this enum; they are raw binary frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a new connection.
    Auth { session_id: String, tx_id: String },

    /// Ask the engine to run one detection step.
    ///
    /// With `retry` set the engine may run the step a second time after a
    /// miss, announcing it with [`EngineMessage::Repeat`].
    Detect {
        action: DetectionAction,
        retry: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// The client is done with the session.
    Close,
}

impl From<StreamAuth> for ClientMessage {
    fn from(auth: StreamAuth) -> Self {
        Self::Auth {
            session_id: auth.session_id,
            tx_id: auth.tx_id,
        }
    }
}

/// Engine → client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineMessage {
    /// Auth accepted; detect calls may follow.
    SessionReady { session_id: String },

    /// Auth refused. The engine closes the connection after this.
    Rejected { reason: String },

    /// The engine missed the action and is trying once more.
    Repeat { action: DetectionAction },

    /// The action was observed.
    Detected { action: DetectionAction },

    /// The action was not observed (after the retry, if any).
    Failed {
        action: DetectionAction,
        reason: String,
    },
}

impl EngineMessage {
    /// The action this message is about, if any.
    pub fn action(&self) -> Option<DetectionAction> {
        match self {
            Self::Repeat { action }
            | Self::Detected { action }
            | Self::Failed { action, .. } => Some(*action),
            Self::SessionReady { .. } | Self::Rejected { .. } => None,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The engine and the HTTP endpoints define exact JSON shapes. These
    //! tests pin our serde attributes to those shapes.

    use super::*;
    use serde_json::json;

    // =====================================================================
    // DetectionAction
    // =====================================================================

    #[test]
    fn test_detection_action_serializes_as_snake_case() {
        let json = serde_json::to_string(&DetectionAction::HeadLeft).unwrap();
        assert_eq!(json, "\"head_left\"");

        let json = serde_json::to_string(&DetectionAction::Face).unwrap();
        assert_eq!(json, "\"face\"");
    }

    #[test]
    fn test_detection_action_display_matches_wire_name() {
        for action in [
            DetectionAction::Face,
            DetectionAction::Smile,
            DetectionAction::HeadLeft,
            DetectionAction::HeadRight,
        ] {
            let wire = serde_json::to_value(action).unwrap();
            assert_eq!(wire, action.to_string());
        }
    }

    // =====================================================================
    // HTTP DTOs
    // =====================================================================

    #[test]
    fn test_token_response_parses_oauth_body() {
        let body = json!({
            "access_token": "t1",
            "token_type": "Bearer",
            "expires_in": 3600
        });
        let token: TokenResponse = serde_json::from_value(body).unwrap();
        assert_eq!(token.access_token, "t1");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn test_token_response_missing_field_is_rejected() {
        let body = json!({ "access_token": "t1", "token_type": "Bearer" });
        assert!(serde_json::from_value::<TokenResponse>(body).is_err());
    }

    #[test]
    fn test_create_session_request_json_format() {
        let req = CreateSessionRequest { tx_id: "abc".into() };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"tx_id": "abc"}));
    }

    // =====================================================================
    // ClientMessage
    // =====================================================================

    #[test]
    fn test_client_message_auth_json_format() {
        let msg = ClientMessage::from(StreamAuth {
            session_id: "s1".into(),
            tx_id: "tx".into(),
        });
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "auth");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["tx_id"], "tx");
    }

    #[test]
    fn test_client_message_detect_json_format() {
        let msg = ClientMessage::Detect {
            action: DetectionAction::Smile,
            retry: true,
            timeout_ms: Some(15_000),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "detect");
        assert_eq!(json["action"], "smile");
        assert_eq!(json["retry"], true);
        assert_eq!(json["timeout_ms"], 15_000);
    }

    #[test]
    fn test_client_message_detect_without_timeout_omits_field() {
        let msg = ClientMessage::Detect {
            action: DetectionAction::Face,
            retry: false,
            timeout_ms: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("timeout_ms").is_none());
    }

    #[test]
    fn test_client_message_close_json_format() {
        let json = serde_json::to_value(&ClientMessage::Close).unwrap();
        assert_eq!(json, json!({"type": "close"}));
    }

    // =====================================================================
    // EngineMessage
    // =====================================================================

    #[test]
    fn test_engine_message_parses_each_variant() {
        let ready: EngineMessage =
            serde_json::from_value(json!({"type": "session_ready", "session_id": "s1"}))
                .unwrap();
        assert_eq!(ready, EngineMessage::SessionReady { session_id: "s1".into() });

        let failed: EngineMessage = serde_json::from_value(json!({
            "type": "failed", "action": "face", "reason": "no face"
        }))
        .unwrap();
        assert_eq!(failed.action(), Some(DetectionAction::Face));

        let repeat: EngineMessage =
            serde_json::from_value(json!({"type": "repeat", "action": "smile"})).unwrap();
        assert_eq!(repeat.action(), Some(DetectionAction::Smile));
    }

    #[test]
    fn test_engine_message_unknown_type_is_rejected() {
        let result =
            serde_json::from_value::<EngineMessage>(json!({"type": "dance"}));
        assert!(result.is_err());
    }
}
