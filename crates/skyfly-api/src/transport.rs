// Transport capability for the request pipeline.
//
// The pipeline never talks to reqwest directly: it hands a fully built
// `TransportRequest` to a `Transport` and classifies what comes back.
// `HttpTransport` is the default reqwest-backed implementation; callers
// may supply their own (shared pools, test doubles).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::HeaderMap;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

/// Fixed per-request ceiling used by the pipeline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: REQUEST_TIMEOUT,
            user_agent: concat!("skyfly/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| Error::Connection {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })
    }
}

/// A single outbound request, fully resolved by the pipeline.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub json: Option<serde_json::Value>,
    pub timeout: Duration,
}

/// Raw response: status plus the undecoded body.
///
/// Whether the body is JSON or an opaque image payload is decided by the
/// caller from the request URL, not by the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// HTTP request capability.
///
/// Implementations must report connection-level failures as
/// [`Error::Connection`], expired deadlines as [`Error::Timeout`] and
/// interrupted response bodies as [`Error::Body`]. Every HTTP status
/// (including 4xx/5xx) is a normal [`TransportResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, Error>;

    /// Release pooled connections. Requests issued afterwards fail with
    /// [`Error::TransportClosed`].
    async fn close(&self);
}

/// `reqwest`-backed [`Transport`].
pub struct HttpTransport {
    http: reqwest::Client,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Create a transport with its own connection pool.
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(config.build_client()?))
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, Error> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let TransportRequest {
            method,
            url,
            headers,
            json,
            timeout,
        } = request;
        debug!("{method} {url}");
        trace!(headers = ?headers.keys().collect::<Vec<_>>(), "request headers");

        let send_error = |e: reqwest::Error| {
            if e.is_timeout() {
                Error::Timeout {
                    url: url.to_string(),
                }
            } else {
                Error::Connection {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };
        let body_error = |e: reqwest::Error| Error::Body {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut builder = self
            .http
            .request(method, url.clone())
            .headers(headers)
            .timeout(timeout);
        if let Some(ref body) = json {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(send_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(body_error)?;

        trace!(status, len = body.len(), "response received");
        Ok(TransportResponse { status, body })
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("HTTP transport closed");
        }
    }
}
