//! The bearer credential and its single-slot cache.
//!
//! A [`Credential`] is considered expired a full minute before the token
//! endpoint says it is, so a request never races the real expiry
//! mid-flight. The [`TokenCache`] holds at most one of them.

use std::fmt;
use std::time::{Duration, Instant};

/// How long before its advertised expiry a credential stops being used.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A bearer token issued by the OAuth token endpoint.
///
/// `issued_at` uses the monotonic clock, so wall-clock jumps never make a
/// token look fresher than it is.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// `token_type` as reported by the endpoint (usually `Bearer`).
    pub token_kind: String,
    /// Total lifetime in seconds, as reported by `expires_in`.
    pub lifetime_secs: u64,
    pub issued_at: Instant,
}

impl Credential {
    /// Creates a credential issued now.
    pub fn new(
        access_token: impl Into<String>,
        token_kind: impl Into<String>,
        lifetime_secs: u64,
    ) -> Self {
        Self::with_issue_time(access_token, token_kind, lifetime_secs, Instant::now())
    }

    /// Creates a credential with an explicit issue instant.
    pub fn with_issue_time(
        access_token: impl Into<String>,
        token_kind: impl Into<String>,
        lifetime_secs: u64,
        issued_at: Instant,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_kind: token_kind.into(),
            lifetime_secs,
            issued_at,
        }
    }

    /// Lifetime minus [`EXPIRY_MARGIN`], floored at zero.
    pub fn usable_lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs).saturating_sub(EXPIRY_MARGIN)
    }

    /// The instant from which the credential must no longer be used.
    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.usable_lifetime()
    }

    /// `true` once `now` has reached [`expires_at`](Self::expires_at).
    /// The boundary instant itself counts as expired.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Keep the token itself out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_kind", &self.token_kind)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TokenCache
// ---------------------------------------------------------------------------

/// Holds at most one credential. Setting a new one replaces the old.
///
/// Not synchronized on its own; [`AuthClient`](crate::AuthClient) keeps it
/// behind an async mutex.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Option<Credential>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached credential, expired or not.
    pub fn get(&self) -> Option<&Credential> {
        self.slot.as_ref()
    }

    pub fn set(&mut self, credential: Credential) {
        self.slot = Some(credential);
    }

    pub fn is_expired(&self, credential: &Credential) -> bool {
        credential.is_expired()
    }

    pub fn is_expired_at(&self, credential: &Credential, now: Instant) -> bool {
        credential.is_expired_at(now)
    }

    /// The cached credential if it is still usable at `now`.
    pub fn valid_at(&self, now: Instant) -> Option<&Credential> {
        self.slot.as_ref().filter(|c| !c.is_expired_at(now))
    }

    /// `true` when the slot is empty or holds an expired credential.
    pub fn needs_refresh(&self) -> bool {
        self.valid_at(Instant::now()).is_none()
    }
}
