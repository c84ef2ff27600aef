// skyfly-core: session lifecycle and device reconciliation for SkyBell.
//
// `Skybell` drives login, identity-cache persistence and discovery;
// each `Device` keeps its fragments and event ledger in sync through a
// shared `Session`.

pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod session;
pub mod settings;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::Skybell;
pub use config::{ClientConfig, LOGIN_SLEEP};
pub use device::{Device, DeviceUpdate, ImageKind};
pub use error::CoreError;
pub use session::{ApiRequest, Payload, Session};
pub use settings::{SettingKey, SettingOutcome, SettingValue};

// Wire types callers need without depending on skyfly-api directly.
pub use skyfly_api::models::{
    Acl, Activity, Avatar, DeviceInfo, DeviceRecord, DeviceSettings, EventKind, User,
};
pub use skyfly_api::{IdentityCache, Method, Transport, TransportRequest, TransportResponse};
