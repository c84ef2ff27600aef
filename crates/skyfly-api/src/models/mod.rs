// Wire models for the SkyBell REST surface
//
// Each fragment keeps the fields the library reads as named optionals and
// carries everything else in a flattened `extra` map, so server fields we
// don't model survive a merge and a round-trip through the cache.

pub mod activity;
pub mod device;
pub mod user;

pub use activity::{Activity, EventKind};
pub use device::{Acl, Avatar, DeviceInfo, DeviceRecord, DeviceSettings, InfoStatus, Location};
pub use user::{LoginRequest, LoginResponse, User};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept strings, numbers, and booleans for a string-typed field.
///
/// The API is inconsistent about quoting (`"video_profile": "1"` vs `1`),
/// so scalar fields are normalized to their string form on the way in.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
