//! Credential and session management for the liveness client.
//!
//! This crate handles the two-legged negotiation that precedes streaming:
//!
//! 1. **Credentials**: exchanging an API key for a bearer token and
//!    caching it until shortly before it expires ([`AuthClient`],
//!    [`TokenCache`], [`Credential`])
//! 2. **Sessions**: asking the streaming API for a liveness session tied
//!    to a fresh transaction id ([`SessionClient`], [`Session`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestrator (above)  ← asks a SessionProvider for a Session
//!     ↕
//! Session Layer (this crate)  ← token cache, token exchange, session create
//!     ↕
//! Transport + Protocol (below)  ← HttpTransport, TokenResponse DTOs
//! ```

mod auth;
mod cache;
mod error;
mod session;

pub use auth::{AuthClient, AuthConfig, GRANT_TYPE};
pub use cache::{Credential, EXPIRY_MARGIN, TokenCache};
pub use error::{AuthError, SessionError};
pub use session::{Session, SessionClient, SessionClientConfig, SessionProvider};
