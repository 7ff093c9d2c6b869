//! `run` subcommand — interactive session with the heartbeat running.
//!
//! Edits typed on stdin land in the configuration mirror; the sync loop
//! pushes them to the device on its next tick.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use super::{
    ConfigField, ConnectOutcome, Controller, DeviceCommand, GlobalOpts, RUNNING, Result, Rgb,
    color,
};

const HELP: &str = "\
Commands:
  set FIELD VALUE     edit a field (synced on the next heartbeat)
  color COLOR         set the solid color (hex or name)
  on | off | save     send a discrete command now
  pixel INDEX [COLOR] set one pixel (default: solid color)
  peer ADDR           change the device address (disconnects)
  connect [ADDR]      connect, or disconnect if already connected
  disconnect          stop syncing
  status              show connection state
  get                 show the configuration
  quit                leave";

/// One line of session input.
#[derive(Debug, Clone, PartialEq)]
enum SessionCommand {
    Set(ConfigField, String),
    Color(Rgb),
    Send(DeviceCommand),
    Pixel(u16, Option<Rgb>),
    Peer(String),
    Connect(Option<String>),
    Disconnect,
    Status,
    Get,
    Help,
    Quit,
}

fn parse_line(line: &str) -> std::result::Result<Option<SessionCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let cmd = match (verb.to_lowercase().as_str(), rest.as_slice()) {
        ("set", [field, value @ ..]) if !value.is_empty() => {
            let field: ConfigField = field.parse().map_err(|e| format!("{e}"))?;
            SessionCommand::Set(field, value.join(" "))
        }
        ("color", [c]) => SessionCommand::Color(color::parse_color(c).map_err(|e| e.to_string())?),
        ("on", []) => SessionCommand::Send(DeviceCommand::AllOn),
        ("off", []) => SessionCommand::Send(DeviceCommand::AllOff),
        ("save", []) => SessionCommand::Send(DeviceCommand::Save),
        ("pixel", [idx, tail @ ..]) if tail.len() <= 1 => {
            let idx: u16 = idx
                .parse()
                .map_err(|_| format!("invalid pixel index: {idx}"))?;
            let c = match tail.first() {
                Some(c) => Some(color::parse_color(c).map_err(|e| e.to_string())?),
                None => None,
            };
            SessionCommand::Pixel(idx, c)
        }
        ("peer", [addr]) => SessionCommand::Peer(addr.to_string()),
        ("connect", []) => SessionCommand::Connect(None),
        ("connect", [addr]) => SessionCommand::Connect(Some(addr.to_string())),
        ("disconnect", []) => SessionCommand::Disconnect,
        ("status", []) => SessionCommand::Status,
        ("get", []) => SessionCommand::Get,
        ("help" | "?", []) => SessionCommand::Help,
        ("quit" | "exit", []) => SessionCommand::Quit,
        _ => return Err(format!("unrecognized: {line} (type `help`)")),
    };
    Ok(Some(cmd))
}

fn print_connect(ctrl: &Controller, outcome: &ConnectOutcome) {
    match outcome {
        ConnectOutcome::Busy => println!("  already connecting"),
        _ => println!("  {}", ctrl.status()),
    }
}

/// Apply one command. Returns `false` when the session should end.
fn apply(ctrl: &Controller, cmd: SessionCommand) -> bool {
    match cmd {
        SessionCommand::Set(field, value) => {
            if let Err(e) = ctrl.update_config(field, &value) {
                println!("  {e}");
            }
        }
        SessionCommand::Color(c) => ctrl.edit_config(|cfg| {
            cfg.solid_r = c.r;
            cfg.solid_g = c.g;
            cfg.solid_b = c.b;
        }),
        SessionCommand::Send(command) => {
            let _ = ctrl.send_immediate(command);
            println!("  {}", ctrl.status());
        }
        SessionCommand::Pixel(idx, c) => {
            let rgb = c.unwrap_or_else(|| Rgb::from(ctrl.config().solid_rgb()));
            let _ = ctrl.send_immediate(DeviceCommand::Pixel {
                idx,
                r: rgb.r,
                g: rgb.g,
                b: rgb.b,
            });
            println!("  {}", ctrl.status());
        }
        SessionCommand::Peer(addr) => {
            ctrl.set_peer(&addr);
            println!("  peer: {} ({})", ctrl.peer(), ctrl.state());
        }
        SessionCommand::Connect(target) => {
            let outcome = ctrl.connect(target.as_deref());
            print_connect(ctrl, &outcome);
        }
        SessionCommand::Disconnect => {
            ctrl.disconnect();
            println!("  {}", ctrl.status());
        }
        SessionCommand::Status => {
            println!("  {} {}", ctrl.peer(), ctrl.state());
            let status = ctrl.status();
            if !status.is_empty() {
                println!("  {status}");
            }
        }
        SessionCommand::Get => {
            let config = ctrl.config();
            for field in ConfigField::ALL {
                println!("  {field} = {}", config.get(field));
            }
        }
        SessionCommand::Help => println!("{HELP}"),
        SessionCommand::Quit => return false,
    }
    true
}

pub(super) fn cmd_run(opts: &GlobalOpts) -> Result<()> {
    let settings = super::settings(opts);
    let ctrl = super::controller(&settings);

    println!("[device] {}:{}", settings.peer, settings.port);
    let outcome = ctrl.connect(None);
    print_connect(&ctrl, &outcome);
    ctrl.start_sync(settings.sync_interval());
    println!("Type `help` for commands. Press Ctrl+C to stop.");

    // Background stdin reader
    let (line_tx, line_rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        loop {
            let mut buf = String::new();
            match stdin.read_line(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if line_tx.send(buf).is_err() {
                        break;
                    }
                }
            }
        }
    });

    while RUNNING.load(Ordering::SeqCst) {
        let line = match line_rx.recv_timeout(Duration::from_millis(250)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match parse_line(&line) {
            Ok(Some(cmd)) => {
                if !apply(&ctrl, cmd) {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("  {e}"),
        }
    }

    ctrl.stop_sync();
    println!("Stopped.");
    Ok(())
}
