//! Wire protocol for the liveness client.
//!
//! This crate defines what travels between the client and the remote
//! services:
//!
//! - **Types** ([`TokenResponse`], [`CreateSessionRequest`],
//!   [`ClientMessage`], [`EngineMessage`], [`DetectionAction`]): the
//!   structures that are serialized on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how streaming messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the layers
//! that drive the flow. It doesn't know about connections or credentials;
//! it only knows message shapes.
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Session / Stream (flow)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, CreateSessionRequest, CreateSessionResponse, DetectionAction,
    EngineMessage, StreamAuth, TokenResponse,
};
