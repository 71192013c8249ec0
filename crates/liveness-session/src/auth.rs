//! Client-credentials token exchange.
//!
//! [`AuthClient`] trades a static API key for a short-lived bearer
//! credential and keeps the most recent one in a [`TokenCache`]. Callers
//! ask for a credential with [`AuthClient::get_valid_credential`] and
//! never see an expired one.
//!
//! # Single-flight refresh
//!
//! The cache sits behind a `tokio::sync::Mutex` that stays locked for the
//! whole refresh. A second caller arriving mid-refresh waits on the lock,
//! then finds the fresh credential in the slot and returns it without
//! another round trip.

use liveness_protocol::TokenResponse;
use liveness_transport::{HttpRequest, HttpTransport};
use serde_json::json;
use tokio::sync::Mutex;

use crate::{AuthError, Credential, TokenCache};

/// Grant type sent to the token endpoint.
pub const GRANT_TYPE: &str = "client_credentials";

/// Where and how to obtain bearer credentials.
///
/// The default is empty: URL, key and scope are deployment inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    /// Base URL of the OAuth server, without the `/oauth2/token` path.
    pub auth_base_url: String,
    /// Pre-encoded value sent as `Authorization: Basic <api_key>`.
    pub api_key: String,
    /// OAuth scope requested with the grant.
    pub scope: String,
}

impl AuthConfig {
    /// The full token endpoint URL.
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.auth_base_url.trim_end_matches('/'))
    }

    /// Strips surrounding whitespace from every field and trailing slashes
    /// from the base URL.
    pub fn validated(mut self) -> Self {
        self.auth_base_url = self.auth_base_url.trim().trim_end_matches('/').to_string();
        self.api_key = self.api_key.trim().to_string();
        self.scope = self.scope.trim().to_string();
        self
    }
}

/// Hands out valid bearer credentials, refreshing them when needed.
pub struct AuthClient<T: HttpTransport> {
    transport: T,
    config: AuthConfig,
    cache: Mutex<TokenCache>,
}

impl<T: HttpTransport> AuthClient<T> {
    pub fn new(transport: T, config: AuthConfig) -> Self {
        Self {
            transport,
            config: config.validated(),
            cache: Mutex::new(TokenCache::new()),
        }
    }

    /// The transport this client sends through. Shared with the session
    /// client so both legs of the negotiation use one connection pool.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Returns the cached credential, or fetches a new one if the cache is
    /// empty or the cached one is expired.
    ///
    /// # Errors
    /// - [`AuthError::Transport`]: the token request failed outright
    /// - [`AuthError::Status`]: the endpoint answered non-2xx
    /// - [`AuthError::MalformedBody`]: the body is not a token response
    pub async fn get_valid_credential(&self) -> Result<Credential, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(credential) = cache.get() {
            if !cache.is_expired(credential) {
                return Ok(credential.clone());
            }
            tracing::debug!("cached credential expired, refreshing");
        }

        let credential = self.request_credential().await?;
        cache.set(credential.clone());
        Ok(credential)
    }

    /// Performs the token POST. Does not touch the cache.
    async fn request_credential(&self) -> Result<Credential, AuthError> {
        let request = HttpRequest::post(self.config.token_url())
            .query("grant_type", GRANT_TYPE)
            .query("scope", &self.config.scope)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Authorization", &format!("Basic {}", self.config.api_key))
            .json(&json!({}));

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "token request rejected");
            return Err(AuthError::Status {
                status: response.status,
                body: response.body_text(),
            });
        }

        let body = response.body.ok_or_else(|| {
            AuthError::MalformedBody(format!("empty body with status {}", response.status))
        })?;
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::MalformedBody(e.to_string()))?;

        tracing::info!(
            token_kind = %token.token_type,
            expires_in = token.expires_in,
            "obtained bearer credential"
        );

        Ok(Credential::new(
            token.access_token,
            token.token_type,
            token.expires_in,
        ))
    }
}
