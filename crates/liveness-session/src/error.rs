//! Error types for the session layer.

use liveness_transport::TransportError;

/// Errors from the client-credentials token exchange.
///
/// All of these are fatal to the current attempt; nothing at this layer
/// retries.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token request never produced a usable response.
    #[error("token request failed: {0}")]
    Transport(#[from] TransportError),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The token endpoint answered 2xx but the body is not a token.
    #[error("malformed token response: {0}")]
    MalformedBody(String),
}

/// Errors from creating a liveness session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No valid credential could be obtained.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The endpoint answered with a status outside the expected set and
    /// the body's `error` is not in the acceptable list.
    ///
    /// Carries everything needed to diagnose the failure from a log line.
    #[error("POST {path} failed: expected {expected:?} but got {actual}, body: {body}")]
    UnexpectedStatus {
        path: String,
        expected: Vec<u16>,
        actual: u16,
        body: String,
    },

    /// The status was fine but the body lacks the fields we need.
    #[error("malformed response from {path}: {reason}")]
    MalformedBody { path: String, reason: String },

    /// The request never produced a usable response.
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: TransportError,
    },
}

impl SessionError {
    /// The HTTP status the endpoint answered with, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            Self::Auth(AuthError::Status { status, .. }) => Some(*status),
            // A response arrived but its body was not JSON.
            Self::Transport {
                source: TransportError::MalformedBody { status, .. },
                ..
            }
            | Self::Auth(AuthError::Transport(TransportError::MalformedBody { status, .. })) => {
                Some(*status)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_json() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("<html>oops</html>").unwrap_err()
    }

    #[test]
    fn test_status_unexpected_status_reports_actual() {
        let err = SessionError::UnexpectedStatus {
            path: "/v1/session".into(),
            expected: vec![200],
            actual: 500,
            body: "{}".into(),
        };
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_status_non_json_error_page_reports_status() {
        let err = SessionError::Transport {
            path: "/v1/session".into(),
            source: TransportError::MalformedBody {
                status: 500,
                source: not_json(),
            },
        };
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_status_non_json_token_error_reports_status() {
        let err = SessionError::Auth(AuthError::Transport(TransportError::MalformedBody {
            status: 503,
            source: not_json(),
        }));
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_status_request_never_answered_is_none() {
        let err = SessionError::Transport {
            path: "/v1/session".into(),
            source: TransportError::RequestFailed {
                url: "https://streaming.example.test/v1/session".into(),
                source: std::io::Error::other("connection refused"),
            },
        };
        assert_eq!(err.status(), None);
    }
}
