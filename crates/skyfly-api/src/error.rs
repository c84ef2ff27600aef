use thiserror::Error;

/// Top-level error type for the `skyfly-api` crate.
///
/// Covers the wire-level failure modes: authentication, transport,
/// HTTP status classification, decoding, and the on-disk identity cache.
/// `skyfly-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected or the access token was refused (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Connection-level failure (refused, DNS, TLS, reset).
    ///
    /// Distinct from HTTP error statuses: the request never produced
    /// a response.
    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// The request did not complete within its timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// A response arrived but its body could not be read.
    #[error("Reading response body from {url} failed: {message}")]
    Body { url: String, message: String },

    /// The transport was closed and can no longer issue requests.
    #[error("Transport is closed")]
    TransportClosed,

    /// A header value could not be encoded (non-visible ASCII in a token).
    #[error("Invalid value for header {name}")]
    InvalidHeader { name: &'static str },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Any non-401 status >= 400. `message` carries the response payload.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Cache ───────────────────────────────────────────────────────
    /// Reading, writing or decoding the identity cache file failed.
    #[error("Cache error at {path}: {message}")]
    Cache { path: String, message: String },
}

impl Error {
    /// Returns `true` if this error means the credentials or token were refused.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` for connector failures, the only errors the request
    /// pipeline answers with a re-login. A closed transport is not one of them.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` for any failure to complete the exchange: connector
    /// failures, timeouts and interrupted bodies. Only the first of these
    /// is retried.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Body { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
