//! Device configuration mirror — the state the heartbeat keeps in sync.
//!
//! Field names match the controller firmware's JSON keys exactly.
//! A `get_config` reply is merged field by field through [`ConfigPatch`]:
//! keys the device did not echo keep their local value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedlinkError, Result};
use crate::protocol;

/// One stored WiFi network pushed to the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredential {
    pub ssid: String,
    pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Number of pixels on the strip.
    pub total_leds: u16,
    /// Pixels the effect runs on (1..=total_leds).
    pub active_len: u16,
    /// [`Effect`] index.
    pub effect: u8,
    /// Global brightness.
    pub bright: u8,
    pub breath_en: bool,
    pub breath_freq: u16,
    /// Animation direction, +1 or -1.
    pub dir: i8,
    pub flow_speed: u16,
    pub solid_r: u8,
    pub solid_g: u8,
    pub solid_b: u8,
    pub comet_len: u16,
    pub comet_rainbow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<Vec<NetworkCredential>>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            total_leds: 60,
            active_len: 60,
            effect: Effect::Rainbow as u8,
            bright: 128,
            breath_en: true,
            breath_freq: 15,
            dir: 1,
            flow_speed: 30,
            solid_r: 255,
            solid_g: 80,
            solid_b: 80,
            comet_len: 5,
            comet_rainbow: false,
            wifi: None,
        }
    }
}

// ── Effects ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Effect {
    Rainbow = 0,
    Comet = 1,
    Static = 2,
    Blink = 3,
    Marquee = 4,
}

impl Effect {
    pub const ALL: [Effect; 5] = [
        Effect::Rainbow,
        Effect::Comet,
        Effect::Static,
        Effect::Blink,
        Effect::Marquee,
    ];

    pub fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(idx as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Effect::Rainbow => "rainbow",
            Effect::Comet => "comet",
            Effect::Static => "static",
            Effect::Blink => "blink",
            Effect::Marquee => "marquee",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Effect {
    type Err = ValidationError;

    /// Accepts a name (`"comet"`) or an index (`"1"`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(idx) = s.parse::<u8>() {
            return Effect::from_index(idx).ok_or(ValidationError::OutOfRange {
                field: "effect",
                value: i64::from(idx),
                min: 0,
                max: Effect::ALL.len() as i64 - 1,
            });
        }
        Effect::ALL
            .iter()
            .copied()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "effect",
                value: s.to_string(),
            })
    }
}

// ── Field addressing ──

/// A scalar configuration field, addressed by its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    TotalLeds,
    ActiveLen,
    Effect,
    Bright,
    BreathEn,
    BreathFreq,
    Dir,
    FlowSpeed,
    SolidR,
    SolidG,
    SolidB,
    CometLen,
    CometRainbow,
}

impl ConfigField {
    pub const ALL: [ConfigField; 13] = [
        ConfigField::TotalLeds,
        ConfigField::ActiveLen,
        ConfigField::Effect,
        ConfigField::Bright,
        ConfigField::BreathEn,
        ConfigField::BreathFreq,
        ConfigField::Dir,
        ConfigField::FlowSpeed,
        ConfigField::SolidR,
        ConfigField::SolidG,
        ConfigField::SolidB,
        ConfigField::CometLen,
        ConfigField::CometRainbow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigField::TotalLeds => "total_leds",
            ConfigField::ActiveLen => "active_len",
            ConfigField::Effect => "effect",
            ConfigField::Bright => "bright",
            ConfigField::BreathEn => "breath_en",
            ConfigField::BreathFreq => "breath_freq",
            ConfigField::Dir => "dir",
            ConfigField::FlowSpeed => "flow_speed",
            ConfigField::SolidR => "solid_r",
            ConfigField::SolidG => "solid_g",
            ConfigField::SolidB => "solid_b",
            ConfigField::CometLen => "comet_len",
            ConfigField::CometRainbow => "comet_rainbow",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigField {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        ConfigField::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

// ── Validation ──

/// Rejected configuration edits, and problems [`DeviceConfig::validate`] finds.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnknownField(String),
    InvalidValue {
        field: &'static str,
        value: String,
    },
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    ActiveExceedsTotal {
        active: u16,
        total: u16,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownField(name) => write!(f, "Unknown config field: {name}"),
            ValidationError::InvalidValue { field, value } => {
                write!(f, "Invalid value for {field}: \"{value}\"")
            }
            ValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} = {value} is out of range ({min}..={max})"),
            ValidationError::ActiveExceedsTotal { active, total } => {
                write!(f, "active_len ({active}) exceeds total_leds ({total})")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

fn parse_in_range(
    field: ConfigField,
    value: &str,
    min: i64,
    max: i64,
) -> std::result::Result<i64, ValidationError> {
    let n: i64 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidValue {
            field: field.name(),
            value: value.trim().to_string(),
        })?;
    check_range(field.name(), n, min, max)
}

fn check_range(
    field: &'static str,
    n: i64,
    min: i64,
    max: i64,
) -> std::result::Result<i64, ValidationError> {
    if n < min || n > max {
        return Err(ValidationError::OutOfRange {
            field,
            value: n,
            min,
            max,
        });
    }
    Ok(n)
}

fn parse_bool(field: ConfigField, value: &str) -> std::result::Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(ValidationError::InvalidValue {
            field: field.name(),
            value: other.to_string(),
        }),
    }
}

fn parse_dir(value: &str) -> std::result::Result<i8, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "+1" | "forward" => Ok(1),
        "-1" | "reverse" | "backward" => Ok(-1),
        other => Err(ValidationError::InvalidValue {
            field: "dir",
            value: other.to_string(),
        }),
    }
}

impl DeviceConfig {
    /// Apply one edit, parsing `value` for the field's type and range.
    ///
    /// Shrinking `total_leds` below `active_len` pulls `active_len` down
    /// with it, matching the bound the editor enforces.
    pub fn set(
        &mut self,
        field: ConfigField,
        value: &str,
    ) -> std::result::Result<(), ValidationError> {
        let u8_max = i64::from(u8::MAX);
        let u16_max = i64::from(u16::MAX);
        match field {
            ConfigField::TotalLeds => {
                let n = parse_in_range(field, value, 1, u16_max)? as u16;
                self.total_leds = n;
                self.active_len = self.active_len.min(n);
            }
            ConfigField::ActiveLen => {
                let n = parse_in_range(field, value, 1, i64::from(self.total_leds))?;
                self.active_len = n as u16;
            }
            ConfigField::Effect => self.effect = value.parse::<Effect>()? as u8,
            ConfigField::Bright => self.bright = parse_in_range(field, value, 0, u8_max)? as u8,
            ConfigField::BreathEn => self.breath_en = parse_bool(field, value)?,
            ConfigField::BreathFreq => {
                self.breath_freq = parse_in_range(field, value, 5, 60)? as u16
            }
            ConfigField::Dir => self.dir = parse_dir(value)?,
            ConfigField::FlowSpeed => {
                self.flow_speed = parse_in_range(field, value, 0, 100)? as u16
            }
            ConfigField::SolidR => self.solid_r = parse_in_range(field, value, 0, u8_max)? as u8,
            ConfigField::SolidG => self.solid_g = parse_in_range(field, value, 0, u8_max)? as u8,
            ConfigField::SolidB => self.solid_b = parse_in_range(field, value, 0, u8_max)? as u8,
            ConfigField::CometLen => self.comet_len = parse_in_range(field, value, 1, 30)? as u16,
            ConfigField::CometRainbow => self.comet_rainbow = parse_bool(field, value)?,
        }
        Ok(())
    }

    /// Current value of a field, formatted the way [`set`](Self::set) accepts it.
    pub fn get(&self, field: ConfigField) -> String {
        match field {
            ConfigField::TotalLeds => self.total_leds.to_string(),
            ConfigField::ActiveLen => self.active_len.to_string(),
            ConfigField::Effect => self.effect.to_string(),
            ConfigField::Bright => self.bright.to_string(),
            ConfigField::BreathEn => self.breath_en.to_string(),
            ConfigField::BreathFreq => self.breath_freq.to_string(),
            ConfigField::Dir => self.dir.to_string(),
            ConfigField::FlowSpeed => self.flow_speed.to_string(),
            ConfigField::SolidR => self.solid_r.to_string(),
            ConfigField::SolidG => self.solid_g.to_string(),
            ConfigField::SolidB => self.solid_b.to_string(),
            ConfigField::CometLen => self.comet_len.to_string(),
            ConfigField::CometRainbow => self.comet_rainbow.to_string(),
        }
    }

    /// Validate the whole configuration, collecting all problems.
    ///
    /// A device reply can carry values the editor would never produce, so
    /// this is also useful after a merge.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.total_leds == 0 {
            errors.push(ValidationError::OutOfRange {
                field: "total_leds",
                value: 0,
                min: 1,
                max: i64::from(u16::MAX),
            });
        }
        if self.active_len > self.total_leds {
            errors.push(ValidationError::ActiveExceedsTotal {
                active: self.active_len,
                total: self.total_leds,
            });
        }
        if Effect::from_index(self.effect).is_none() {
            errors.push(ValidationError::OutOfRange {
                field: "effect",
                value: i64::from(self.effect),
                min: 0,
                max: Effect::ALL.len() as i64 - 1,
            });
        }
        if self.dir != 1 && self.dir != -1 {
            errors.push(ValidationError::InvalidValue {
                field: "dir",
                value: self.dir.to_string(),
            });
        }
        for (field, value, min, max) in [
            ("breath_freq", i64::from(self.breath_freq), 5, 60),
            ("flow_speed", i64::from(self.flow_speed), 0, 100),
            ("comet_len", i64::from(self.comet_len), 1, 30),
        ] {
            if let Err(e) = check_range(field, value, min, max) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Copy with the invariants the firmware relies on forced to hold:
    /// `active_len <= total_leds` and `dir` in {-1, +1}.
    pub fn normalized(&self) -> DeviceConfig {
        let mut out = self.clone();
        out.active_len = out.active_len.min(out.total_leds);
        out.dir = if out.dir < 0 { -1 } else { 1 };
        out
    }

    /// Overlay every field present in `patch`.
    pub fn merge(&mut self, patch: ConfigPatch) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $( if let Some(v) = patch.$field { self.$field = v; } )*
            };
        }
        overlay!(
            total_leds,
            active_len,
            effect,
            bright,
            breath_en,
            breath_freq,
            dir,
            flow_speed,
            solid_r,
            solid_g,
            solid_b,
            comet_len,
            comet_rainbow,
        );
        if let Some(wifi) = patch.wifi {
            self.wifi = Some(wifi);
        }
    }

    /// Decode a `get_config` reply and merge it over this configuration.
    ///
    /// Fails with a protocol error (leaving `self` untouched) when the reply
    /// is not a JSON object or a known field has the wrong type.
    pub fn merge_reply(&mut self, payload: &[u8]) -> Result<()> {
        let obj = protocol::decode_object(payload)?;
        let patch: ConfigPatch = serde_json::from_value(serde_json::Value::Object(obj))
            .map_err(|e| LedlinkError::Protocol(format!("config reply: {e}")))?;
        self.merge(patch);
        Ok(())
    }

    /// Solid color as an `(r, g, b)` triple.
    pub fn solid_rgb(&self) -> (u8, u8, u8) {
        (self.solid_r, self.solid_g, self.solid_b)
    }
}

/// A partial configuration: every field optional, unknown keys ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigPatch {
    pub total_leds: Option<u16>,
    pub active_len: Option<u16>,
    pub effect: Option<u8>,
    pub bright: Option<u8>,
    pub breath_en: Option<bool>,
    pub breath_freq: Option<u16>,
    pub dir: Option<i8>,
    pub flow_speed: Option<u16>,
    pub solid_r: Option<u8>,
    pub solid_g: Option<u8>,
    pub solid_b: Option<u8>,
    pub comet_len: Option<u16>,
    pub comet_rainbow: Option<bool>,
    pub wifi: Option<Vec<NetworkCredential>>,
}
