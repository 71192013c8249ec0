//! Liveness session creation.
//!
//! A "session" is the remote service's record of one liveness attempt.
//! The client picks the transaction id (a fresh UUIDv4) before asking,
//! and the service answers with the session id. Both are then presented
//! when opening the streaming connection.

use std::future::Future;
use std::sync::Arc;

use liveness_protocol::{CreateSessionRequest, CreateSessionResponse, StreamAuth};
use liveness_transport::{HttpRequest, HttpTransport};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AuthClient, SessionError};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One liveness attempt's identity. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Assigned by the remote service.
    pub session_id: String,
    /// Generated locally and sent as `tx_id`.
    pub transaction_id: Uuid,
}

impl Session {
    /// The auth block for the streaming connection.
    pub fn stream_auth(&self) -> StreamAuth {
        StreamAuth {
            session_id: self.session_id.clone(),
            tx_id: self.transaction_id.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionProvider
// ---------------------------------------------------------------------------

/// Creates liveness sessions.
///
/// The orchestrator only depends on this trait, so tests can inject
/// sessions (or failures) without any HTTP in sight.
pub trait SessionProvider: Send + Sync + 'static {
    /// Creates a brand-new session with a fresh transaction id.
    ///
    /// # Errors
    /// Any [`SessionError`]; all of them are fatal to the attempt.
    fn create_session(&self) -> impl Future<Output = Result<Session, SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// SessionClient
// ---------------------------------------------------------------------------

/// Where the session endpoint lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionClientConfig {
    /// Base URL of the streaming API, without the `/v1/session` path.
    pub streaming_base_url: String,
}

impl SessionClientConfig {
    pub fn session_url(&self) -> String {
        format!("{}/v1/session", self.streaming_base_url.trim_end_matches('/'))
    }

    /// Strips surrounding whitespace and trailing slashes from the base URL.
    pub fn validated(mut self) -> Self {
        self.streaming_base_url = self
            .streaming_base_url
            .trim()
            .trim_end_matches('/')
            .to_string();
        self
    }
}

/// Creates liveness sessions using credentials from an [`AuthClient`].
pub struct SessionClient<T: HttpTransport> {
    auth: Arc<AuthClient<T>>,
    config: SessionClientConfig,
}

impl<T: HttpTransport> SessionClient<T> {
    pub fn new(auth: Arc<AuthClient<T>>, config: SessionClientConfig) -> Self {
        Self {
            auth,
            config: config.validated(),
        }
    }

    /// Obtains a credential, generates a transaction id, and asks the
    /// service for a session.
    ///
    /// # Errors
    /// - [`SessionError::Auth`]: no credential could be obtained
    /// - [`SessionError::UnexpectedStatus`]: anything but 200
    /// - [`SessionError::MalformedBody`]: 200 without a `session_id`
    pub async fn create_session(&self) -> Result<Session, SessionError> {
        let credential = self.auth.get_valid_credential().await?;
        let transaction_id = Uuid::new_v4();
        let path = self.config.session_url();
        let bearer = credential.bearer_header();

        let data = self
            .post_resource(
                &path,
                &[
                    ("Authorization", bearer.as_str()),
                    ("Content-Type", "application/json"),
                ],
                &json!(CreateSessionRequest {
                    tx_id: transaction_id.to_string(),
                }),
                &[200],
                &[],
            )
            .await?;

        let response: CreateSessionResponse =
            serde_json::from_value(data).map_err(|e| SessionError::MalformedBody {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            session_id = %response.session_id,
            %transaction_id,
            "liveness session created"
        );

        Ok(Session {
            session_id: response.session_id,
            transaction_id,
        })
    }

    /// POSTs `json` to `path` and checks the status.
    ///
    /// The call succeeds when the status is one of `expected_statuses`,
    /// or when the body's `error` field is one of `acceptable_errors`.
    /// On success the body's `error` value is returned if it has one,
    /// otherwise the whole body (`null` for 204/205).
    ///
    /// # Errors
    /// - [`SessionError::Transport`]: no usable response
    /// - [`SessionError::UnexpectedStatus`]: status and error both rejected
    pub async fn post_resource(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        json: &Value,
        expected_statuses: &[u16],
        acceptable_errors: &[&str],
    ) -> Result<Value, SessionError> {
        let request = headers
            .iter()
            .fold(HttpRequest::post(path), |req, (name, value)| {
                req.header(name, value)
            })
            .json(json);

        let response = self.auth.transport().send(request).await.map_err(|source| {
            SessionError::Transport {
                path: path.to_string(),
                source,
            }
        })?;

        let acceptable = response
            .error_field()
            .and_then(Value::as_str)
            .is_some_and(|code| acceptable_errors.contains(&code));

        if !expected_statuses.contains(&response.status) && !acceptable {
            return Err(SessionError::UnexpectedStatus {
                path: path.to_string(),
                expected: expected_statuses.to_vec(),
                actual: response.status,
                body: response.body_text(),
            });
        }

        let body = response.body.unwrap_or(Value::Null);
        Ok(match body.get("error") {
            Some(error) if !error.is_null() => error.clone(),
            _ => body,
        })
    }
}

impl<T: HttpTransport> SessionProvider for SessionClient<T> {
    fn create_session(&self) -> impl Future<Output = Result<Session, SessionError>> + Send {
        SessionClient::create_session(self)
    }
}
