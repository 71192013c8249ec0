/// Failures while turning engine messages into bytes or back.
///
/// Never a network problem: those surface as transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value could not be serialized.
    #[cfg(feature = "json")]
    #[error("could not encode message: {0}")]
    Encode(serde_json::Error),

    /// Bytes from the engine did not match any known message: bad JSON,
    /// an unknown `type` tag or a missing field.
    #[cfg(feature = "json")]
    #[error("could not decode message: {0}")]
    Decode(serde_json::Error),

    /// A message decoded fine but makes no sense at this point of the
    /// exchange.
    #[error("unexpected message: {0}")]
    InvalidMessage(String),
}
