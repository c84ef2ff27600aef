// skyfly-api: wire layer for the SkyBell cloud doorbell API
//
// Transport capability, endpoint catalogue, typed fragment models with
// additive merge, and the persisted identity cache. Session policy
// (login, retry, reconciliation) lives in `skyfly-core`.

pub mod cache;
pub mod endpoints;
pub mod error;
pub mod merge;
pub mod models;
pub mod transport;

pub use cache::{CacheStore, IdentityCache};
pub use endpoints::Endpoints;
pub use error::Error;
pub use merge::Merge;
pub use transport::{
    HttpTransport, REQUEST_TIMEOUT, Transport, TransportConfig, TransportRequest,
    TransportResponse,
};

pub use reqwest::Method;
pub use reqwest::header;
pub use reqwest::header::HeaderMap;
