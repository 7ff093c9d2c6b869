//! Wire protocol for the LED controller: one JSON object per UDP datagram.
//!
//! Every datagram carries a `cmd` tag. The device answers only `get_config`
//! (with its current configuration) and the `discover` broadcast (with its
//! hardware address); everything else is fire-and-forget.
//!
//! | cmd          | fields                                  | reply |
//! |--------------|-----------------------------------------|-------|
//! | `config`     | all configuration fields, optional wifi | no    |
//! | `get_config` | —                                       | yes   |
//! | `save`       | —                                       | no    |
//! | `all_on`     | —                                       | no    |
//! | `all_off`    | —                                       | no    |
//! | `pixel`      | `idx`, `r`, `g`, `b`                    | no    |
//! | `discover`   | — (broadcast)                           | yes   |

use std::time::Duration;

use serde_json::{Map, Value};

use crate::device_config::{DeviceConfig, NetworkCredential};
use crate::error::{LedlinkError, Result};

// ── Constants ──

/// UDP port the controller firmware listens on.
pub const DEFAULT_PORT: u16 = 8888;

/// Peer address used until the user picks another one.
pub const DEFAULT_PEER: &str = "192.168.1.117";

/// Heartbeat period of the config sync loop.
pub const SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Bound on the `get_config` round trip.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a discovery broadcast collects replies.
pub const SCAN_WINDOW: Duration = Duration::from_secs(3);

/// Largest datagram we expect back from a device.
pub const MAX_DATAGRAM: usize = 2048;

// ── Commands ──

/// A command sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Full configuration mirror (heartbeat payload).
    Config(DeviceConfig),
    /// Configuration update carrying only the credential list.
    Networks(Vec<NetworkCredential>),
    /// Ask the device for its current configuration.
    GetConfig,
    /// Persist the device's current configuration to flash.
    Save,
    /// Light every pixel.
    AllOn,
    /// Blank every pixel.
    AllOff,
    /// Set a single pixel.
    Pixel { idx: u16, r: u8, g: u8, b: u8 },
    /// Discovery broadcast.
    Discover,
}

impl Command {
    /// The `cmd` tag this command travels under.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Config(_) | Command::Networks(_) => "config",
            Command::GetConfig => "get_config",
            Command::Save => "save",
            Command::AllOn => "all_on",
            Command::AllOff => "all_off",
            Command::Pixel { .. } => "pixel",
            Command::Discover => "discover",
        }
    }

    /// Build the JSON object for this command, `cmd` tag included.
    pub fn to_value(&self) -> Result<Value> {
        let mut obj = Map::new();
        obj.insert("cmd".into(), Value::from(self.tag()));
        match self {
            Command::Config(config) => match serde_json::to_value(config) {
                Ok(Value::Object(fields)) => obj.extend(fields),
                Ok(_) => {
                    return Err(LedlinkError::Protocol(
                        "config did not serialize to an object".into(),
                    ));
                }
                Err(e) => return Err(LedlinkError::Protocol(format!("encode config: {e}"))),
            },
            Command::Networks(entries) => {
                let wifi = serde_json::to_value(entries)
                    .map_err(|e| LedlinkError::Protocol(format!("encode wifi: {e}")))?;
                obj.insert("wifi".into(), wifi);
            }
            Command::Pixel { idx, r, g, b } => {
                obj.insert("idx".into(), Value::from(*idx));
                obj.insert("r".into(), Value::from(*r));
                obj.insert("g".into(), Value::from(*g));
                obj.insert("b".into(), Value::from(*b));
            }
            Command::GetConfig
            | Command::Save
            | Command::AllOn
            | Command::AllOff
            | Command::Discover => {}
        }
        Ok(Value::Object(obj))
    }

    /// Encode as the datagram payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let value = self.to_value()?;
        serde_json::to_vec(&value).map_err(|e| LedlinkError::Protocol(format!("encode: {e}")))
    }
}

/// Parse a datagram as a JSON object, as every device reply must be.
pub fn decode_object(payload: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(other) => Err(LedlinkError::Protocol(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(LedlinkError::Protocol(format!("invalid JSON reply: {e}"))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
