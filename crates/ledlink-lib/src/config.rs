//! Client settings — TOML-based, platform-aware paths.
//!
//! These are the client's own settings (which device, which port, timing),
//! not the device configuration mirrored over the wire.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_PEER, DEFAULT_PORT};

/// Header comment prepended to saved settings files.
const CONFIG_HEADER: &str =
    "# ledlink settings — changes made outside the app may be overwritten.\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Device address (dotted quad or hostname). Default: "192.168.1.117".
    #[serde(default = "default_peer")]
    pub peer: String,

    /// Device UDP port. Default: 8888.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Heartbeat period in milliseconds. Default: 100.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// How long to wait for a `get_config` reply. Default: 3000.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// How long a scan collects replies. Default: 3000.
    #[serde(default = "default_scan_window_ms")]
    pub scan_window_ms: u64,
}

fn default_peer() -> String {
    DEFAULT_PEER.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_sync_interval_ms() -> u64 {
    100
}
fn default_reply_timeout_ms() -> u64 {
    3000
}
fn default_scan_window_ms() -> u64 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            peer: default_peer(),
            port: default_port(),
            sync_interval_ms: default_sync_interval_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            scan_window_ms: default_scan_window_ms(),
        }
    }
}

/// Problems that [`Config::validate`] can report.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingError {
    /// The `peer` field is empty or whitespace-only.
    EmptyPeer,
    /// The `port` field is 0.
    ZeroPort,
    /// A millisecond field is outside its accepted range.
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::EmptyPeer => write!(f, "Peer address cannot be empty"),
            SettingError::ZeroPort => write!(f, "Port cannot be 0"),
            SettingError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "Invalid {field}: {value} (expected {min}..={max})"),
        }
    }
}

impl Config {
    /// Platform-specific settings directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ledlink"))
    }

    /// Full path to the settings file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load settings from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Save to an arbitrary path atomically (write to temp file, then rename).
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // Rename can fail across filesystems; fall back to direct write + cleanup
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Save to the default platform path.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Load from an arbitrary path, returning the settings and any parse warnings.
    ///
    /// A missing file yields `(defaults, [])`; an unparseable one yields
    /// `(defaults, [warning])`.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    /// Validate every field, collecting all problems.
    pub fn validate(&self) -> std::result::Result<(), Vec<SettingError>> {
        let mut errors = Vec::new();

        if self.peer.trim().is_empty() {
            errors.push(SettingError::EmptyPeer);
        }
        if self.port == 0 {
            errors.push(SettingError::ZeroPort);
        }

        let ranges: [(&'static str, u64, u64, u64); 3] = [
            ("sync_interval_ms", self.sync_interval_ms, 10, 10_000),
            ("reply_timeout_ms", self.reply_timeout_ms, 100, 60_000),
            ("scan_window_ms", self.scan_window_ms, 100, 60_000),
        ];
        for (field, value, min, max) in ranges {
            if !(min..=max).contains(&value) {
                errors.push(SettingError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ──

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.peer, "192.168.1.117");
        assert_eq!(c.port, 8888);
        assert_eq!(c.sync_interval(), Duration::from_millis(100));
        assert_eq!(c.reply_timeout(), Duration::from_secs(3));
        assert_eq!(c.scan_window(), Duration::from_secs(3));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: Config = toml::from_str("peer = \"10.0.0.4\"").unwrap();
        assert_eq!(c.peer, "10.0.0.4");
        assert_eq!(c.port, 8888);
        assert_eq!(c.sync_interval_ms, 100);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn wrong_type_toml_is_an_error() {
        assert!(toml::from_str::<Config>("port = \"eighty\"").is_err());
    }

    #[test]
    fn config_path_ends_with_toml() {
        if let Some(p) = Config::path() {
            assert!(p.ends_with("ledlink/config.toml"));
        }
    }

    // ── validate ──

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let c = Config {
            peer: "  ".into(),
            port: 0,
            sync_interval_ms: 0,
            reply_timeout_ms: 3000,
            scan_window_ms: 100_000,
        };
        let errors = c.validate().unwrap_err();
        assert_eq!(errors.len(), 4, "got: {errors:?}");
        assert_eq!(errors[0], SettingError::EmptyPeer);
        assert_eq!(errors[1], SettingError::ZeroPort);
        assert!(matches!(
            errors[2],
            SettingError::OutOfRange {
                field: "sync_interval_ms",
                ..
            }
        ));
        assert!(matches!(
            errors[3],
            SettingError::OutOfRange {
                field: "scan_window_ms",
                ..
            }
        ));
    }

    #[test]
    fn setting_error_display() {
        let e = SettingError::OutOfRange {
            field: "sync_interval_ms",
            value: 5,
            min: 10,
            max: 10_000,
        };
        assert_eq!(e.to_string(), "Invalid sync_interval_ms: 5 (expected 10..=10000)");
        assert_eq!(SettingError::EmptyPeer.to_string(), "Peer address cannot be empty");
    }

    // ── save_to / load_from ──

    #[test]
    fn save_to_load_from_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let c = Config {
            peer: "10.0.0.9".into(),
            port: 9999,
            sync_interval_ms: 250,
            ..Config::default()
        };
        c.save_to(&path).unwrap();
        let (loaded, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert_eq!(loaded, c);
    }

    #[test]
    fn save_to_includes_header_and_cleans_up_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# ledlink settings"));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (c, warnings) = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(c, Config::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn load_from_invalid_toml_returns_defaults_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "peer = [[[").unwrap();
        let (c, warnings) = Config::load_from(&path);
        assert_eq!(c, Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("using defaults"));
    }
}
