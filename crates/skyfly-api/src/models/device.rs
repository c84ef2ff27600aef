// ── Device fragments ──
//
// A device's state arrives as four independently fetched documents:
// the listing record, owner-only info, settings, and avatar metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use super::lenient_string;
use crate::merge::{Merge, deep_merge, merge_field, merge_nested};

/// Access level of the authenticated user on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
pub enum Acl {
    #[strum(serialize = "owner")]
    Owner,
    #[strum(serialize = "device:basic")]
    Basic,
    #[strum(serialize = "device:read")]
    Read,
    /// Missing or unrecognized ACL string.
    #[strum(serialize = "")]
    Unknown,
}

impl Acl {
    /// Parse the wire value, mapping anything unrecognized to [`Acl::Unknown`].
    pub fn parse(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Unknown)
    }

    pub fn is_owner(self) -> bool {
        self == Self::Owner
    }

    pub fn is_read_only(self) -> bool {
        self == Self::Read
    }
}

// ── Listing record ──────────────────────────────────────────────────

/// Geographic location attached to a device record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub lng: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Merge for Location {
    fn merge(&mut self, patch: Self) {
        merge_field(&mut self.lat, patch.lat);
        merge_field(&mut self.lng, patch.lng);
        deep_merge(&mut self.extra, patch.extra);
    }
}

/// Identity and status as returned by `GET devices/` (and `devices/{id}/`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_invite_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceRecord {
    pub fn acl(&self) -> Acl {
        Acl::parse(self.acl.as_deref().unwrap_or_default())
    }

    /// `true` when nothing has been populated yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Merge for DeviceRecord {
    fn merge(&mut self, patch: Self) {
        if !patch.id.is_empty() {
            self.id = patch.id;
        }
        merge_field(&mut self.name, patch.name);
        merge_field(&mut self.device_type, patch.device_type);
        merge_field(&mut self.acl, patch.acl);
        merge_field(&mut self.status, patch.status);
        merge_field(&mut self.user, patch.user);
        merge_nested(&mut self.location, patch.location);
        merge_field(&mut self.uuid, patch.uuid);
        merge_field(&mut self.resource_id, patch.resource_id);
        merge_field(&mut self.device_invite_token, patch.device_invite_token);
        merge_field(&mut self.created_at, patch.created_at);
        merge_field(&mut self.updated_at, patch.updated_at);
        deep_merge(&mut self.extra, patch.extra);
    }
}

// ── Info (owner only) ───────────────────────────────────────────────

/// Connectivity block nested in [`DeviceInfo`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoStatus {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub wifi_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Merge for InfoStatus {
    fn merge(&mut self, patch: Self) {
        merge_field(&mut self.wifi_link, patch.wifi_link);
        deep_merge(&mut self.extra, patch.extra);
    }
}

/// Hardware and network details from `GET devices/{id}/info/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub hardware_revision: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub essid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub local_hostname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub wifi_link_quality: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub wifi_signal_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<InfoStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceInfo {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Merge for DeviceInfo {
    fn merge(&mut self, patch: Self) {
        merge_field(&mut self.mac, patch.mac);
        merge_field(&mut self.serial_no, patch.serial_no);
        merge_field(&mut self.firmware_version, patch.firmware_version);
        merge_field(&mut self.hardware_revision, patch.hardware_revision);
        merge_field(&mut self.essid, patch.essid);
        merge_field(&mut self.checked_in_at, patch.checked_in_at);
        merge_field(&mut self.address, patch.address);
        merge_field(&mut self.local_hostname, patch.local_hostname);
        merge_field(&mut self.region, patch.region);
        merge_field(&mut self.wifi_link_quality, patch.wifi_link_quality);
        merge_field(&mut self.wifi_signal_level, patch.wifi_signal_level);
        merge_nested(&mut self.status, patch.status);
        deep_merge(&mut self.extra, patch.extra);
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Device settings from `GET devices/{id}/settings/`.
///
/// The API reports every value as a string; PATCH bodies use integers
/// for numeric settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub do_not_disturb: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub do_not_ring: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub chime_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub motion_policy: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub motion_threshold: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub video_profile: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub green_r: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub green_g: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub green_b: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub led_intensity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub ring_tone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub digital_doorbell: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub mic_volume: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub speaker_volume: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Merge for DeviceSettings {
    fn merge(&mut self, patch: Self) {
        merge_field(&mut self.do_not_disturb, patch.do_not_disturb);
        merge_field(&mut self.do_not_ring, patch.do_not_ring);
        merge_field(&mut self.chime_level, patch.chime_level);
        merge_field(&mut self.motion_policy, patch.motion_policy);
        merge_field(&mut self.motion_threshold, patch.motion_threshold);
        merge_field(&mut self.video_profile, patch.video_profile);
        merge_field(&mut self.green_r, patch.green_r);
        merge_field(&mut self.green_g, patch.green_g);
        merge_field(&mut self.green_b, patch.green_b);
        merge_field(&mut self.led_intensity, patch.led_intensity);
        merge_field(&mut self.ring_tone, patch.ring_tone);
        merge_field(&mut self.digital_doorbell, patch.digital_doorbell);
        merge_field(&mut self.mic_volume, patch.mic_volume);
        merge_field(&mut self.speaker_volume, patch.speaker_volume);
        deep_merge(&mut self.extra, patch.extra);
    }
}

// ── Avatar ──────────────────────────────────────────────────────────

/// Avatar metadata from `GET devices/{id}/avatar/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Avatar {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Merge for Avatar {
    fn merge(&mut self, patch: Self) {
        merge_field(&mut self.created_at, patch.created_at);
        merge_field(&mut self.url, patch.url);
        deep_merge(&mut self.extra, patch.extra);
    }
}
