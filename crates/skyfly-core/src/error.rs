// ── Core error types ──
//
// User-facing errors from skyfly-core. The `From<skyfly_api::Error>`
// impl translates wire-layer failures into the variants callers match on;
// the request pipeline adds URL context for connection failures itself.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    /// Missing credentials, refused login, a 401, or a write attempted
    /// with a read-only grant.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ────────────────────────────────────────────────────
    /// An API request could not be completed at the connection level.
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// A media download (avatar or activity thumbnail) failed to connect.
    #[error("Failed to fetch image from {url}: {reason}")]
    ImageFetchFailed { url: String, reason: String },

    // ── API errors ───────────────────────────────────────────────────
    /// The service answered with a non-401 error status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    #[error("Invalid value for setting {key}: {value}")]
    InvalidSetting { key: String, value: String },

    #[error("Unknown setting: {key}")]
    UnknownSetting { key: String },

    #[error("Invalid activity timestamp: {value}")]
    InvalidTimestamp { value: String },

    #[error("Failed to decode response: {message}")]
    Deserialization { message: String },

    // ── Local state ──────────────────────────────────────────────────
    #[error("Identity cache error: {message}")]
    Cache { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    pub(crate) fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<skyfly_api::Error> for CoreError {
    fn from(err: skyfly_api::Error) -> Self {
        match err {
            skyfly_api::Error::Authentication { message } => CoreError::Authentication { message },
            skyfly_api::Error::Connection { url, message } => CoreError::RequestFailed {
                url,
                reason: message,
            },
            skyfly_api::Error::Timeout { url } => CoreError::RequestFailed {
                url,
                reason: "request timed out".into(),
            },
            skyfly_api::Error::Body { url, message } => CoreError::RequestFailed {
                url,
                reason: message,
            },
            skyfly_api::Error::TransportClosed => CoreError::RequestFailed {
                url: String::new(),
                reason: "transport is closed".into(),
            },
            skyfly_api::Error::InvalidHeader { name } => CoreError::RequestFailed {
                url: String::new(),
                reason: format!("invalid value for header {name}"),
            },
            skyfly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            skyfly_api::Error::Api { status, message } => CoreError::Api { status, message },
            skyfly_api::Error::Deserialization { message, body } => {
                tracing::debug!(body = %body, "undecodable response body");
                CoreError::Deserialization { message }
            }
            skyfly_api::Error::Cache { path, message } => CoreError::Cache {
                message: format!("{path}: {message}"),
            },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Deserialization {
            message: err.to_string(),
        }
    }
}
