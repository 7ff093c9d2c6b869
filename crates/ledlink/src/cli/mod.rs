//! CLI subcommands — discovery, configuration, discrete commands, WiFi.

mod config_cmd;
mod get;
mod pixel;
mod run;
mod scan;
mod send;
mod set;
mod wifi;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use ledlink_lib::color::{self, Rgb};
pub(super) use ledlink_lib::config::Config;
pub(super) use ledlink_lib::controller::{ConnectOutcome, Controller};
pub(super) use ledlink_lib::device_config::{ConfigField, DeviceConfig, Effect};
pub(super) use ledlink_lib::discovery::DiscoveredDevice;
pub(super) use ledlink_lib::error::{LedlinkError, Result};
pub(super) use ledlink_lib::protocol::Command as DeviceCommand;
pub(super) use ledlink_lib::transport::UdpTransport;

pub use wifi::WifiAction;

const PADDING: usize = 2;

/// Flags shared by every subcommand.
pub struct GlobalOpts {
    pub json: bool,
    pub peer: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// Ask a yes/no question on stdin. Anything but `y` is a no.
pub(super) fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).is_ok() && answer.trim().eq_ignore_ascii_case("y")
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LedlinkError::Protocol(format!("encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Load settings from `custom_path` or the platform default, logging any
/// parse warnings.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    match custom_path {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    }
}

/// Settings with the `--peer` override applied.
pub(super) fn settings(opts: &GlobalOpts) -> Config {
    let mut config = load_config(opts.config_path.as_deref());
    if let Some(peer) = &opts.peer {
        config.peer = peer.trim().to_string();
    }
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::warn!("[config] {e}");
        }
    }
    config
}

/// A controller for the configured peer, not yet connected.
pub(super) fn controller(settings: &Config) -> Controller {
    Controller::new(Arc::new(UdpTransport::new(settings.port)), settings)
}

/// A controller that has pulled the device's configuration.
pub(super) fn connected(opts: &GlobalOpts) -> Result<Controller> {
    let settings = settings(opts);
    let ctrl = controller(&settings);
    match ctrl.connect(None) {
        ConnectOutcome::Connected => Ok(ctrl),
        ConnectOutcome::Failed(msg) => Err(LedlinkError::Connection(format!(
            "{}: {msg}",
            settings.peer
        ))),
        other => Err(LedlinkError::Connection(format!(
            "{}: unexpected outcome {other:?}",
            settings.peer
        ))),
    }
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct ScanOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredDevice>,
}

#[derive(Serialize)]
pub(super) struct DeviceOutput {
    pub peer: String,
    pub state: String,
    pub effect_name: Option<&'static str>,
    pub config: DeviceConfig,
}

#[derive(Serialize)]
pub(super) struct NetworkJson {
    pub index: usize,
    pub ssid: String,
    pub has_password: bool,
}

#[derive(Serialize)]
pub(super) struct NetworksOutput {
    pub count: usize,
    pub networks: Vec<NetworkJson>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Discover controllers on the local network
    Scan {
        /// Pick one of the found devices and store it as the peer
        #[arg(long)]
        select: bool,
        /// Skip the confirmation prompt when selecting
        #[arg(long)]
        accept: bool,
    },

    /// Connect and print the device configuration
    Get,

    /// Connect, apply FIELD=VALUE edits and push the result
    Set {
        /// Edits such as `bright=200`, `effect=comet` or `color=#FF8000`
        #[arg(required = true, value_name = "FIELD=VALUE")]
        assignments: Vec<String>,
    },

    /// Light every pixel
    On,

    /// Blank every pixel
    Off,

    /// Ask the device to persist its current configuration
    Save,

    /// Set a single pixel
    Pixel {
        /// Pixel index (0-based)
        index: u16,
        /// Color (hex or name); defaults to the device's solid color
        color: Option<String>,
    },

    /// Manage the device's stored WiFi networks
    Wifi {
        #[command(subcommand)]
        action: WifiAction,
    },

    /// Interactive session: keep the device in sync while you edit
    Run,

    /// Show the settings file location and values
    Config,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &GlobalOpts) -> Result<()> {
    match cmd {
        Command::Scan { select, accept } => scan::cmd_scan(opts, select, accept),
        Command::Get => get::cmd_get(opts),
        Command::Set { assignments } => {
            if opts.json {
                warn_json_unsupported("set");
            }
            set::cmd_set(opts, &assignments)
        }
        Command::On => send::cmd_send(opts, DeviceCommand::AllOn),
        Command::Off => send::cmd_send(opts, DeviceCommand::AllOff),
        Command::Save => send::cmd_send(opts, DeviceCommand::Save),
        Command::Pixel { index, color } => {
            if opts.json {
                warn_json_unsupported("pixel");
            }
            pixel::cmd_pixel(opts, index, color.as_deref())
        }
        Command::Wifi { action } => wifi::cmd_wifi(opts, action),
        Command::Run => {
            if opts.json {
                warn_json_unsupported("run");
            }
            run::cmd_run(opts)
        }
        Command::Config => config_cmd::cmd_config(opts),
    }
}
