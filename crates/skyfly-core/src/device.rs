// ── Device reconciler ──
//
// One remote doorbell. State arrives as four independently fetched
// fragments plus the activity list; each fragment is refreshed on demand,
// on an explicit override, or when still empty. The per-event-type
// "latest activity" ledger lives in the session's identity cache so it
// survives restarts.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde_json::Value;
use skyfly_api::Merge;
use skyfly_api::models::{
    Acl, Activity, Avatar, DeviceInfo, DeviceRecord, DeviceSettings, EventKind,
};
use strum::{AsRefStr, Display};
use tracing::{Instrument, debug, warn};

use crate::error::CoreError;
use crate::session::{ApiRequest, Session};
use crate::settings::{self, SettingKey, SettingOutcome, SettingValue};

/// Wire format of activity timestamps.
pub const ACTIVITY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Slots of the binary image cache. One image per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ImageKind {
    Avatar,
    Activity,
}

/// Which fragments to refresh and what to merge over them.
///
/// A fragment is fetched when `refresh` is set, when an override for it
/// is supplied, or when the held copy is still empty.
#[derive(Debug, Clone)]
pub struct DeviceUpdate {
    pub device: Option<DeviceRecord>,
    pub info: Option<DeviceInfo>,
    pub settings: Option<DeviceSettings>,
    pub avatar: Option<Avatar>,
    /// Re-fetch every fragment and reconcile activities.
    pub refresh: bool,
    /// Supplement the record with the per-device detail document.
    pub get_devices: bool,
}

impl Default for DeviceUpdate {
    fn default() -> Self {
        Self {
            device: None,
            info: None,
            settings: None,
            avatar: None,
            refresh: true,
            get_devices: false,
        }
    }
}

impl DeviceUpdate {
    /// Fetch only what is missing or overridden; skip activities.
    pub fn lazy() -> Self {
        Self {
            refresh: false,
            ..Self::default()
        }
    }
}

/// A doorbell registered with the client.
pub struct Device {
    device_id: String,
    record: DeviceRecord,
    info: DeviceInfo,
    settings: DeviceSettings,
    avatar: Avatar,
    activities: Vec<Activity>,
    images: HashMap<ImageKind, Bytes>,
    session: Arc<Session>,
}

impl Device {
    /// Wrap a listing record. Nothing is fetched until [`Device::update`].
    pub fn new(record: DeviceRecord, session: Arc<Session>) -> Self {
        Self {
            device_id: record.id.clone(),
            record,
            info: DeviceInfo::default(),
            settings: DeviceSettings::default(),
            avatar: Avatar::default(),
            activities: Vec::new(),
            images: HashMap::new(),
            session,
        }
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Refresh fragments per `update` and, when refreshing, reconcile
    /// the activity list.
    pub async fn update(&mut self, update: DeviceUpdate) -> Result<(), CoreError> {
        let span = self.session.span().clone();
        self.apply_update(update).instrument(span).await
    }

    async fn apply_update(&mut self, update: DeviceUpdate) -> Result<(), CoreError> {
        let DeviceUpdate {
            device,
            info,
            settings,
            avatar,
            refresh,
            get_devices,
        } = update;

        debug!(device_id = %self.device_id, refresh, "updating device");

        if refresh || device.is_some() || self.record.is_empty() {
            self.refresh_record(device, get_devices).await?;
        }
        if refresh || avatar.is_some() || self.avatar.is_empty() {
            self.refresh_avatar(avatar).await?;
        }

        // Access level may have changed with the record merge above.
        let acl = self.acl();
        if acl.is_owner() && (refresh || info.is_some() || self.info.is_empty()) {
            let url = self.session.endpoints().device_info(&self.device_id);
            self.info = self.session.get_json(url).await?;
            if let Some(patch) = info {
                self.info.merge(patch);
            }
        }
        if !acl.is_read_only() && (refresh || settings.is_some() || self.settings.is_empty()) {
            let url = self.session.endpoints().device_settings(&self.device_id);
            self.settings = self.session.get_json(url).await?;
            if let Some(patch) = settings {
                self.settings.merge(patch);
            }
        }

        if refresh {
            self.update_activities().await?;
        }
        Ok(())
    }

    async fn refresh_record(
        &mut self,
        patch: Option<DeviceRecord>,
        get_devices: bool,
    ) -> Result<(), CoreError> {
        if get_devices {
            let url = self.session.endpoints().device(&self.device_id);
            let detail: DeviceRecord = self.session.get_json(url).await?;
            self.record.merge(detail);
        }
        if let Some(patch) = patch {
            self.record.merge(patch);
        }
        Ok(())
    }

    async fn refresh_avatar(&mut self, patch: Option<Avatar>) -> Result<(), CoreError> {
        let url = self.session.endpoints().device_avatar(&self.device_id);
        let fetched: Avatar = self.session.get_json(url).await?;

        if fetched.created_at != self.avatar.created_at {
            if let Some(image_url) = fetched.url.as_deref() {
                debug!(device_id = %self.device_id, "avatar changed, fetching image");
                let image = self.session.fetch_image(image_url).await?;
                self.images.insert(ImageKind::Avatar, image);
            }
        }

        self.avatar = fetched;
        if let Some(patch) = patch {
            self.avatar.merge(patch);
        }
        Ok(())
    }

    /// Fetch the activity list, cache thumbnails, and fold it into the
    /// event ledger. The fetched list replaces the held one.
    pub async fn update_activities(&mut self) -> Result<(), CoreError> {
        let url = self.session.endpoints().device_activities(&self.device_id);
        let fetched: Vec<Activity> = self
            .session
            .get_json::<Option<Vec<Activity>>>(url)
            .await?
            .unwrap_or_default();

        if self.activities.is_empty() {
            self.update_events(&fetched).await?;
            if let Some(media) = self.latest(None)?.and_then(|latest| latest.media) {
                let image = self.session.fetch_image(&media).await?;
                self.images.insert(ImageKind::Activity, image);
            }
        } else {
            let known: HashSet<&str> = self.activities.iter().map(|a| a.id.as_str()).collect();
            for activity in fetched.iter().filter(|a| !known.contains(a.id.as_str())) {
                let Some(media) = activity.media.as_deref() else {
                    continue;
                };
                debug!(device_id = %self.device_id, activity_id = %activity.id, "new activity");
                // Single slot: the last new activity's image wins.
                let image = self.session.fetch_image(media).await?;
                self.images.insert(ImageKind::Activity, image);
            }
        }

        self.activities = fetched;
        self.update_events(&self.activities).await
    }

    /// Keep, per event type, whichever record is newest, then persist.
    async fn update_events(&self, activities: &[Activity]) -> Result<(), CoreError> {
        let mut events = self.session.device_events(&self.device_id);
        for activity in activities {
            let newer = events
                .get(&activity.event)
                .is_none_or(|stored| activity.is_newer_than(stored));
            if newer {
                events.insert(activity.event.clone(), activity.clone());
            }
        }
        self.session
            .store_device_events(&self.device_id, &events)
            .await
    }

    // ── Activity queries ────────────────────────────────────────────

    /// The newest ledger entry, overall or for one event type.
    ///
    /// Short sensor names (`"motion"`) are accepted. Without a type, every
    /// stored timestamp must parse or the call fails.
    pub fn latest(&self, event_type: Option<&str>) -> Result<Option<Activity>, CoreError> {
        let mut events = self.session.device_events(&self.device_id);
        if let Some(event_type) = event_type {
            return Ok(events.remove(&EventKind::expand(event_type)));
        }

        let mut newest: Option<(NaiveDateTime, Activity)> = None;
        for activity in events.into_values() {
            let created = parse_timestamp(&activity.created_at)?;
            if newest.as_ref().is_none_or(|(best, _)| created > *best) {
                newest = Some((created, activity));
            }
        }
        Ok(newest.map(|(_, activity)| activity))
    }

    /// Up to `limit` held activities in server order, optionally of one
    /// event type. The type must match exactly; short names are not expanded.
    pub fn activities(&self, limit: usize, event_type: Option<&str>) -> Vec<&Activity> {
        self.activities
            .iter()
            .filter(|activity| event_type.is_none_or(|event| activity.event == event))
            .take(limit)
            .collect()
    }

    /// The persisted ledger, keyed by event type.
    pub fn events(&self) -> BTreeMap<String, Activity> {
        self.session.device_events(&self.device_id)
    }

    // ── Settings ────────────────────────────────────────────────────

    /// Validate and PATCH one setting.
    ///
    /// Read-only access, unknown keys and illegal values are errors and
    /// send nothing. A failed PATCH is logged and reported as
    /// [`SettingOutcome::NotApplied`].
    pub async fn set_setting(
        &self,
        key: &str,
        value: impl Into<SettingValue>,
    ) -> Result<SettingOutcome, CoreError> {
        if self.acl().is_read_only() {
            return Err(CoreError::authentication(
                "attempted to change a setting with read-only access",
            ));
        }
        let key = SettingKey::parse(key)?;
        let value = value.into();
        let patch = settings::settings_patch(key, &value)?;

        let url = self.session.endpoints().device_settings(&self.device_id);
        let request = ApiRequest::patch(url, Value::Object(patch));
        let result = self
            .session
            .send_request(request)
            .instrument(self.session.span().clone())
            .await;

        match result {
            Ok(_) => {
                debug!(device_id = %self.device_id, %key, %value, "setting applied");
                Ok(SettingOutcome::Applied)
            }
            Err(e) => {
                warn!(device_id = %self.device_id, %key, error = %e, "failed to apply setting");
                Ok(SettingOutcome::NotApplied {
                    reason: e.to_string(),
                })
            }
        }
    }

    // ── Identity accessors ──────────────────────────────────────────

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn name(&self) -> &str {
        self.record.name.as_deref().unwrap_or_default()
    }

    pub fn device_type(&self) -> &str {
        self.record.device_type.as_deref().unwrap_or_default()
    }

    pub fn acl(&self) -> Acl {
        self.record.acl()
    }

    pub fn owner(&self) -> bool {
        self.acl().is_owner()
    }

    /// Id of the account that owns the device.
    pub fn user_id(&self) -> &str {
        self.record.user.as_deref().unwrap_or_default()
    }

    pub fn status(&self) -> &str {
        self.record.status.as_deref().unwrap_or_default()
    }

    pub fn is_up(&self) -> bool {
        self.status() == "up"
    }

    /// `(lat, lng)`, `"0"` when unknown.
    pub fn location(&self) -> (&str, &str) {
        let location = self.record.location.as_ref();
        (
            location.and_then(|l| l.lat.as_deref()).unwrap_or("0"),
            location.and_then(|l| l.lng.as_deref()).unwrap_or("0"),
        )
    }

    pub fn image_url(&self) -> &str {
        self.avatar.url.as_deref().unwrap_or_default()
    }

    // ── Info accessors (owner only) ─────────────────────────────────

    pub fn mac(&self) -> Option<&str> {
        self.info.mac.as_deref()
    }

    pub fn serial_no(&self) -> &str {
        self.info.serial_no.as_deref().unwrap_or_default()
    }

    pub fn firmware_ver(&self) -> &str {
        self.info.firmware_version.as_deref().unwrap_or_default()
    }

    pub fn wifi_status(&self) -> &str {
        self.info
            .status
            .as_ref()
            .and_then(|status| status.wifi_link.as_deref())
            .unwrap_or_default()
    }

    pub fn wifi_ssid(&self) -> &str {
        self.info.essid.as_deref().unwrap_or_default()
    }

    pub fn last_check_in(&self) -> &str {
        self.info.checked_in_at.as_deref().unwrap_or_default()
    }

    // ── Settings accessors ──────────────────────────────────────────

    pub fn do_not_disturb(&self) -> bool {
        self.settings
            .do_not_disturb
            .as_deref()
            .is_some_and(settings::parse_flag)
    }

    pub fn do_not_ring(&self) -> bool {
        self.settings
            .do_not_ring
            .as_deref()
            .is_some_and(settings::parse_flag)
    }

    pub fn outdoor_chime_level(&self) -> i64 {
        parse_int(self.settings.chime_level.as_deref())
    }

    pub fn outdoor_chime(&self) -> bool {
        self.outdoor_chime_level() != 0
    }

    pub fn motion_sensor(&self) -> bool {
        self.settings.motion_policy.as_deref() == Some(settings::MOTION_POLICY_ON)
    }

    pub fn motion_threshold(&self) -> i64 {
        parse_int(self.settings.motion_threshold.as_deref())
    }

    pub fn video_profile(&self) -> i64 {
        parse_int(self.settings.video_profile.as_deref())
    }

    /// Button LED colour as `(r, g, b)`.
    pub fn led_rgb(&self) -> (u8, u8, u8) {
        let channel =
            |raw: Option<&str>| -> u8 { raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0) };
        (
            channel(self.settings.green_r.as_deref()),
            channel(self.settings.green_g.as_deref()),
            channel(self.settings.green_b.as_deref()),
        )
    }

    pub fn led_intensity(&self) -> i64 {
        parse_int(self.settings.led_intensity.as_deref())
    }

    // ── Raw state ───────────────────────────────────────────────────

    pub fn desc(&self) -> String {
        format!(
            "{} (id: {}) - {} - status: {} - wifi status: {}",
            self.name(),
            self.device_id,
            self.device_type(),
            self.status(),
            self.wifi_status()
        )
    }

    pub fn images(&self) -> &HashMap<ImageKind, Bytes> {
        &self.images
    }

    pub fn image(&self, kind: ImageKind) -> Option<&Bytes> {
        self.images.get(&kind)
    }

    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    /// The held activity list, newest first.
    pub fn activity_log(&self) -> &[Activity] {
        &self.activities
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("device_id", &self.device_id)
            .field("name", &self.name())
            .field("acl", &self.acl())
            .field("activities", &self.activities.len())
            .finish_non_exhaustive()
    }
}

/// Parse an activity timestamp. The fraction is mandatory and limited to
/// microsecond precision, matching what the service emits.
fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, CoreError> {
    let invalid = || CoreError::InvalidTimestamp {
        value: raw.to_owned(),
    };

    let fraction = raw
        .strip_suffix('Z')
        .and_then(|rest| rest.rsplit_once('.'))
        .map(|(_, fraction)| fraction);
    let well_formed = fraction.is_some_and(|digits| {
        (1..=6).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
    });
    if !well_formed {
        return Err(invalid());
    }

    NaiveDateTime::parse_from_str(raw, ACTIVITY_TIME_FORMAT).map_err(|_| invalid())
}

fn parse_int(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_parse_with_fraction() {
        assert!(parse_timestamp("2020-03-30T12:35:02.204Z").is_ok());
        assert!(parse_timestamp("2020-03-30T12:35:02.123456Z").is_ok());
        assert!(parse_timestamp("2020-03-30T12:35:02.2Z").is_ok());
        assert!(parse_timestamp("2020-03-30 12:35:02").is_err());
    }

    #[test]
    fn timestamps_require_a_microsecond_fraction() {
        assert!(parse_timestamp("2020-03-30T12:35:02Z").is_err());
        assert!(parse_timestamp("2020-03-30T12:35:02.Z").is_err());
        assert!(parse_timestamp("2020-03-30T12:35:02.123456789Z").is_err());
        assert!(parse_timestamp("2020-03-30T12:35:02.204").is_err());
        assert!(parse_timestamp("2020-03-30T12:35:02.2a4Z").is_err());
    }

    #[test]
    fn image_kinds_render_as_slot_names() {
        assert_eq!(ImageKind::Avatar.as_ref(), "avatar");
        assert_eq!(ImageKind::Activity.to_string(), "activity");
    }

    #[test]
    fn unparsable_numbers_default_to_zero() {
        assert_eq!(parse_int(Some("3")), 3);
        assert_eq!(parse_int(Some("loud")), 0);
        assert_eq!(parse_int(None), 0);
    }
}
