/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, TCP, TLS or upgrade).
    #[error("connect to {url} failed: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The HTTP request could not be completed.
    #[error("request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The response body was not valid JSON.
    ///
    /// Only raised for statuses that are expected to carry a body
    /// (everything except 204 and 205).
    #[error("malformed response body (status {status}): {source}")]
    MalformedBody {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}
