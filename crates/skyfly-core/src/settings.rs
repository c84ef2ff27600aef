// ── Device settings mutation ──
//
// Maps a caller's key/value pair onto the PATCH body the settings
// endpoint expects: alias resolution, value coercion, then validation
// against each key's legal values. Nothing here touches the network.

use std::fmt;

use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::CoreError;

// ── Wire keys ───────────────────────────────────────────────────────

pub const DO_NOT_DISTURB: &str = "do_not_disturb";
pub const DO_NOT_RING: &str = "do_not_ring";
pub const CHIME_LEVEL: &str = "chime_level";
pub const MOTION_POLICY: &str = "motion_policy";
pub const MOTION_THRESHOLD: &str = "motion_threshold";
pub const VIDEO_PROFILE: &str = "video_profile";
pub const LED_INTENSITY: &str = "led_intensity";
pub const LED_RED: &str = "green_r";
pub const LED_GREEN: &str = "green_g";
pub const LED_BLUE: &str = "green_b";

pub const MOTION_POLICY_ON: &str = "call";
pub const MOTION_POLICY_OFF: &str = "disabled";

const FLAG_VALUES: [&str; 2] = ["True", "False"];
const CHIME_LEVELS: [i64; 4] = [0, 1, 2, 3];
/// Vendor sensitivity presets (high, medium, low).
const MOTION_THRESHOLDS: [i64; 3] = [100, 50, 32];
const VIDEO_PROFILES: [i64; 4] = [0, 1, 2, 3];

/// A settable key, including the accepted alias spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum SettingKey {
    #[strum(to_string = "do_not_disturb")]
    DoNotDisturb,
    #[strum(to_string = "do_not_ring")]
    DoNotRing,
    #[strum(to_string = "motion_policy", serialize = "motion_sensor")]
    MotionPolicy,
    /// RGB colour of the button LED, written as three channel keys.
    #[strum(to_string = "hs_color")]
    LedColor,
    #[strum(to_string = "chime_level")]
    ChimeLevel,
    #[strum(to_string = "motion_threshold")]
    MotionThreshold,
    #[strum(to_string = "video_profile")]
    VideoProfile,
    #[strum(to_string = "led_intensity", serialize = "brightness")]
    LedIntensity,
}

impl SettingKey {
    /// Resolve a caller-supplied key or alias.
    pub fn parse(key: &str) -> Result<Self, CoreError> {
        key.parse().map_err(|_| CoreError::UnknownSetting {
            key: key.to_owned(),
        })
    }
}

/// A value handed to `Device::set_setting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<i64>),
}

impl SettingValue {
    fn is_truthy(&self) -> bool {
        match self {
            SettingValue::Bool(b) => *b,
            SettingValue::Int(n) => *n != 0,
            SettingValue::Text(s) => !s.is_empty(),
            SettingValue::List(items) => !items.is_empty(),
        }
    }

    fn as_flag(&self) -> String {
        match self {
            SettingValue::Bool(true) => "True".to_owned(),
            SettingValue::Bool(false) => "False".to_owned(),
            other => other.to_string(),
        }
    }

    fn as_int(&self, key: SettingKey) -> Result<i64, CoreError> {
        match self {
            SettingValue::Int(n) => Ok(*n),
            SettingValue::Bool(b) => Ok(i64::from(*b)),
            SettingValue::Text(s) => s.trim().parse().map_err(|_| invalid(key, self)),
            SettingValue::List(_) => Err(invalid(key, self)),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(n) => write!(f, "{n}"),
            SettingValue::Text(s) => f.write_str(s),
            SettingValue::List(items) => write!(f, "{items:?}"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

macro_rules! int_setting_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for SettingValue {
            fn from(value: $ty) -> Self {
                SettingValue::Int(i64::from(value))
            }
        })*
    };
}

int_setting_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_owned())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<Vec<i64>> for SettingValue {
    fn from(value: Vec<i64>) -> Self {
        SettingValue::List(value)
    }
}

impl From<[i64; 3]> for SettingValue {
    fn from(value: [i64; 3]) -> Self {
        SettingValue::List(value.to_vec())
    }
}

impl From<(u8, u8, u8)> for SettingValue {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        SettingValue::List(vec![r.into(), g.into(), b.into()])
    }
}

/// Result of a settings PATCH that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingOutcome {
    Applied,
    /// The PATCH was sent but failed; the device state is unknown.
    NotApplied { reason: String },
}

impl SettingOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SettingOutcome::Applied)
    }
}

// ── Coercion + validation ───────────────────────────────────────────

/// Build the validated PATCH body for `key = value`.
pub fn settings_patch(
    key: SettingKey,
    value: &SettingValue,
) -> Result<Map<String, Value>, CoreError> {
    let mut patch = Map::new();
    match key {
        SettingKey::DoNotDisturb | SettingKey::DoNotRing => {
            let flag = value.as_flag();
            if !FLAG_VALUES.contains(&flag.as_str()) {
                return Err(invalid(key, value));
            }
            patch.insert(key.to_string(), Value::String(flag));
        }
        SettingKey::MotionPolicy => {
            let policy = if value.is_truthy() {
                MOTION_POLICY_ON
            } else {
                MOTION_POLICY_OFF
            };
            patch.insert(MOTION_POLICY.into(), Value::String(policy.into()));
        }
        SettingKey::LedColor => {
            let SettingValue::List(channels) = value else {
                return Err(invalid(key, value));
            };
            let [r, g, b] = channels.as_slice() else {
                return Err(invalid(key, value));
            };
            for (wire, channel) in [(LED_RED, *r), (LED_GREEN, *g), (LED_BLUE, *b)] {
                if !(0..=255).contains(&channel) {
                    return Err(CoreError::InvalidSetting {
                        key: wire.into(),
                        value: channel.to_string(),
                    });
                }
                patch.insert(wire.into(), Value::from(channel));
            }
        }
        SettingKey::ChimeLevel
        | SettingKey::MotionThreshold
        | SettingKey::VideoProfile
        | SettingKey::LedIntensity => {
            let number = value.as_int(key)?;
            let legal = match key {
                SettingKey::ChimeLevel => CHIME_LEVELS.contains(&number),
                SettingKey::MotionThreshold => MOTION_THRESHOLDS.contains(&number),
                SettingKey::VideoProfile => VIDEO_PROFILES.contains(&number),
                _ => (0..=100).contains(&number),
            };
            if !legal {
                return Err(invalid(key, value));
            }
            patch.insert(key.to_string(), Value::from(number));
        }
    }
    Ok(patch)
}

fn invalid(key: SettingKey, value: &SettingValue) -> CoreError {
    CoreError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Lenient boolean parsing used by the flag getters.
pub(crate) fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "t" | "true" | "on" | "1"
    )
}
