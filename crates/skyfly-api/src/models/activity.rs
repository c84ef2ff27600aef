// ── Activity records ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

/// One entry of `GET devices/{id}/activities/` (newest first).
///
/// `created_at` is fixed-width ISO-8601 (`YYYY-MM-DDTHH:MM:SS.fffZ`), so
/// lexical and chronological order agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub created_at: String,
    /// Media (thumbnail) URL on the asset host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// `true` when this record is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.created_at > other.created_at
    }

    pub fn kind(&self) -> Option<EventKind> {
        self.event.parse().ok()
    }
}

/// Event types the service is known to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
pub enum EventKind {
    #[strum(serialize = "device:sensor:button")]
    Button,
    #[strum(serialize = "device:sensor:motion")]
    Motion,
    #[strum(serialize = "application:on-demand")]
    OnDemand,
}

impl EventKind {
    /// Prefix applied to short sensor names (`"motion"` → `"device:sensor:motion"`).
    pub const SENSOR_PREFIX: &'static str = "device:sensor:";

    /// Expand a short sensor name to its full event type. Full types
    /// (anything containing `:`) pass through unchanged.
    pub fn expand(event_type: &str) -> String {
        if event_type.contains(':') {
            event_type.to_owned()
        } else {
            format!("{}{event_type}", Self::SENSOR_PREFIX)
        }
    }
}
