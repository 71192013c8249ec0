//! Streaming connection to the remote liveness engine.
//!
//! The orchestrator sees the engine only through the [`LivenessEngine`]
//! trait: `open` an authenticated connection bound to a video surface,
//! run `detect` steps, `close`. [`WsLivenessEngine`] implements it over a
//! WebSocket with JSON control frames and binary video frames.
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestrator (above)  ← open / detect / close
//!     ↕
//! Stream Layer (this crate)  ← handshake, frame pump, step timeouts
//!     ↕
//! Transport + Protocol + Camera (below)  ← Connection, Codec, VideoSurface
//! ```

#![allow(async_fn_in_trait)]

mod engine;
mod error;
mod ws;

pub use engine::{DetectOptions, LivenessEngine, RepeatCallback};
pub use error::EngineError;
pub use ws::{DEFAULT_HANDSHAKE_TIMEOUT, WsLivenessEngine};
