//! HTTP transport seam for metadata and package retrieval.
//!
//! The pipeline only needs a blocking GET that exposes the status code, the
//! advertised content length, and a streaming body. [`HttpTransport`] captures
//! exactly that so tests can serve canned responses without network access,
//! and [`UreqTransport`] is the production implementation.

use std::io::Read;
use std::time::Duration;

/// Time limits applied to one request.
///
/// `read` bounds the wait for the response head. The body has its own
/// budget for the whole transfer, since a large package on a slow link can
/// take far longer than any sensible response deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Upper bound for establishing the connection.
    pub connect: Duration,
    /// Upper bound for receiving the response status and headers.
    pub read: Duration,
    /// Upper bound for receiving the entire body.
    pub body: Duration,
}

impl Timeouts {
    /// Use the same bound for every phase.
    #[must_use]
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            read: timeout,
            body: timeout,
        }
    }
}

/// A response whose body has not been consumed yet.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of `Content-Length`, when the server sent one.
    pub content_length: Option<u64>,
    /// Streaming response body.
    pub body: Box<dyn Read>,
}

impl HttpResponse {
    /// Build a response from an in-memory body, mainly for tests and fakes.
    #[must_use]
    pub fn from_bytes(status: u16, body: Vec<u8>) -> Self {
        let content_length = u64::try_from(body.len()).ok();
        Self {
            status,
            content_length,
            body: Box::new(std::io::Cursor::new(body)),
        }
    }

    /// Return `true` for any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Errors raised before a response is available.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be completed (DNS, TLS, timeout, refused).
    #[error("request to {url} failed: {reason}")]
    Request {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },
}

/// Trait for issuing blocking HTTP GET requests.
///
/// Non-2xx statuses are returned as responses, not errors, so callers decide
/// how to treat them.
#[cfg_attr(test, mockall::automock)]
pub trait HttpTransport {
    /// Perform a GET request against `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] when no response was received.
    fn get(&self, url: &str, timeouts: Timeouts) -> Result<HttpResponse, TransportError>;
}

/// HTTP transport backed by `ureq`.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport {
    user_agent: Option<String>,
}

impl UreqTransport {
    /// Create a transport that sends the given `User-Agent`.
    #[must_use]
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
        }
    }

    fn agent(timeouts: Timeouts) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(timeouts.connect))
            .timeout_recv_response(Some(timeouts.read))
            .timeout_recv_body(Some(timeouts.body))
            .http_status_as_error(false)
            .build();
        ureq::Agent::new_with_config(config)
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str, timeouts: Timeouts) -> Result<HttpResponse, TransportError> {
        let agent = Self::agent(timeouts);
        let mut request = agent.get(url);
        if let Some(user_agent) = &self.user_agent {
            request = request.header("User-Agent", user_agent);
        }
        let response = request.call().map_err(|e| TransportError::Request {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let content_length = response.body().content_length();
        let body = response.into_body().into_reader();
        Ok(HttpResponse {
            status,
            content_length,
            body: Box::new(body),
        })
    }
}
