//! The generic request/response primitive.
//!
//! Callers build an [`HttpRequest`], hand it to an [`HttpTransport`], and
//! get back an [`HttpResponse`] holding the status and the parsed JSON body.
//! Nothing here knows about tokens or sessions; the session layer decides
//! which statuses are acceptable.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::TransportError;

/// An outgoing POST request. Both liveness endpoints are POST-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Query parameters, URL-encoded by the transport.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Starts a POST request to `url` with no headers and no body.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Appends a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the body to the serialized form of `json`.
    pub fn json(mut self, json: &Value) -> Self {
        self.body = Some(json.to_string());
        self
    }

    /// Returns the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A completed response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON body. `None` for 204/205.
    pub body: Option<Value>,
}

impl HttpResponse {
    /// `true` for any status in the 200–299 range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `error` field of the body, if the body is an object carrying one.
    pub fn error_field(&self) -> Option<&Value> {
        self.body.as_ref().and_then(|b| b.get("error"))
    }

    /// The body rendered back to JSON text for diagnostics (`null` when absent).
    pub fn body_text(&self) -> String {
        match &self.body {
            Some(body) => body.to_string(),
            None => "null".to_string(),
        }
    }
}

/// Statuses whose responses carry no body and are never parsed.
pub fn is_empty_status(status: u16) -> bool {
    matches!(status, 204 | 205)
}

/// Sends a request and returns status + body.
///
/// Implemented by [`ReqwestTransport`] in production and by hand-written
/// doubles in tests.
pub trait HttpTransport: Send + Sync + 'static {
    /// Performs the request.
    ///
    /// # Errors
    /// - [`TransportError::RequestFailed`]: the request never produced a
    ///   response (DNS, connect, TLS, read failure).
    /// - [`TransportError::MalformedBody`]: the body of a non-204/205
    ///   response was not JSON.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

impl<T: HttpTransport> HttpTransport for Arc<T> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

/// Parses a raw response body according to its status.
pub(crate) fn parse_body(
    status: u16,
    text: &str,
) -> Result<Option<Value>, TransportError> {
    if is_empty_status(status) {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|source| TransportError::MalformedBody { status, source })
}

// ---------------------------------------------------------------------------
// ReqwestTransport
// ---------------------------------------------------------------------------

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl ReqwestTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing client (custom timeouts, proxies, TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.post(&request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            TransportError::RequestFailed {
                url: request.url.clone(),
                source: std::io::Error::other(e),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                url = %request.url,
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or(""),
                "request returned non-success status"
            );
        }

        let text = response.text().await.map_err(|e| {
            TransportError::RequestFailed {
                url: request.url.clone(),
                source: std::io::Error::other(e),
            }
        })?;

        let status = status.as_u16();
        let body = parse_body(status, &text)?;
        tracing::debug!(url = %request.url, status, "request completed");

        Ok(HttpResponse { status, body })
    }
}
