//! Text retrieval over HTTP, with an optional second stage through a proxy.
//!
//! The pipeline only depends on [`Transport`]: "give me the body at this URL
//! or a [`TransportError`]". Everything about how that happens lives here:
//!
//! - [`HttpTransport`] - direct GET with a timeout, status check and size limit
//! - [`ProxyTransport`] - rewrites the target into a `{prefix}{encoded url}` proxy request
//! - [`FallbackTransport`] - tries a primary transport, then a fallback on any error
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Responses larger than this are rejected before they are fully buffered.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Default per-request timeout for [`HttpTransport`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors raised while retrieving one URL.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded its time budget
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Fetches the text body of a URL.
///
/// Implementations must be shareable across the concurrent per-handle
/// fetches of a single run.
pub trait Transport: Send + Sync {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, TransportError>> + Send {
        (**self).fetch_text(url)
    }
}

// ============================================================================
// HttpTransport
// ============================================================================

/// Direct HTTP GET via reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport with its own client and the given user agent.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client, timeout })
    }

    /// Wraps an existing client (caller controls configuration).
    pub fn from_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(TransportError::Network)?;

        if !response.status().is_success() {
            tracing::debug!(url = %url, status = %response.status(), "Non-success status from mirror");
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        read_limited_text(response, MAX_FEED_SIZE).await
    }
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, TransportError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(TransportError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // Mirrors occasionally serve Latin-1; a stray byte must not cost the whole feed
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::debug!(error = %e, "Response is not valid UTF-8, decoding lossily");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

// ============================================================================
// ProxyTransport
// ============================================================================

/// Routes every request through a "raw passthrough" proxy.
///
/// The target URL is form-encoded and appended to `prefix`, so a prefix of
/// `https://proxy.example/raw?url=` turns `https://nitter.net/jack/rss` into
/// `https://proxy.example/raw?url=https%3A%2F%2Fnitter.net%2Fjack%2Frss`.
#[derive(Debug, Clone)]
pub struct ProxyTransport<T> {
    inner: T,
    prefix: String,
}

impl<T: Transport> ProxyTransport<T> {
    pub fn new(inner: T, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn proxied_url(&self, url: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        format!("{}{}", self.prefix, encoded)
    }
}

impl<T: Transport> Transport for ProxyTransport<T> {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        let proxied = self.proxied_url(url);
        self.inner.fetch_text(&proxied).await
    }
}

// ============================================================================
// FallbackTransport
// ============================================================================

/// Two-stage retrieval: the primary transport first, the fallback on any error.
///
/// When both stages fail the fallback's error is returned. Without a fallback
/// this behaves exactly like the primary.
#[derive(Debug, Clone)]
pub struct FallbackTransport<P, F> {
    primary: P,
    fallback: Option<F>,
}

impl<P: Transport, F: Transport> FallbackTransport<P, F> {
    pub fn new(primary: P, fallback: Option<F>) -> Self {
        Self { primary, fallback }
    }
}

impl<P: Transport, F: Transport> Transport for FallbackTransport<P, F> {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        let err = match self.primary.fetch_text(url).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(err);
        };

        tracing::warn!(url = %url, error = %err, "Direct fetch failed, retrying through fallback");
        fallback.fetch_text(url).await
    }
}
