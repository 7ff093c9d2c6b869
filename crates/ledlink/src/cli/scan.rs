//! `scan` subcommand — discover controllers, optionally pick one as the peer.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use ledlink_lib::discovery::DiscoverySession;

use super::{
    Config, ConnectOutcome, GlobalOpts, LedlinkError, Result, ScanOutput, UdpTransport, confirm,
    print_json,
};

pub(super) fn cmd_scan(opts: &GlobalOpts, select: bool, accept: bool) -> Result<()> {
    let mut settings = super::settings(opts);
    let window = settings.scan_window();
    let transport = Arc::new(UdpTransport::new(settings.port));

    if !opts.json {
        println!("Scanning for {:.1}s...", window.as_secs_f64());
    }
    let mut session = DiscoverySession::start(transport, window);
    session.wait(window + Duration::from_secs(1));
    let devices = session.devices();

    if opts.json && !select {
        return print_json(&ScanOutput {
            count: devices.len(),
            devices,
        });
    }

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!(
        "Found {} device{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();
    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] {}  ({})", i + 1, dev.ip, dev.mac);
    }

    if !select {
        return Ok(());
    }
    println!();

    let index = match devices.len() {
        1 => 0,
        n => {
            print!("Select device [1-{n}]: ");
            std::io::stdout().flush().ok();
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer)?;
            match answer.trim().parse::<usize>() {
                Ok(k) if (1..=n).contains(&k) => k - 1,
                _ => {
                    println!("Aborted.");
                    return Ok(());
                }
            }
        }
    };

    let Some(picked) = session.request_connect(index).cloned() else {
        return Ok(());
    };
    if !accept && !confirm(&format!("Use {} ({}) as the device?", picked.ip, picked.mac)) {
        session.dismiss();
        println!("Aborted.");
        return Ok(());
    }
    let Some(addr) = session.confirm() else {
        return Ok(());
    };

    settings.peer = addr.clone();
    let save_result = match &opts.config_path {
        Some(path) => settings.save_to(path),
        None => settings.save(),
    };
    save_result.map_err(|e| LedlinkError::Config(format!("save settings: {e}")))?;
    let path = opts.config_path.clone().or_else(Config::path);
    match path {
        Some(p) => println!("Peer set to {addr} ({})", p.display()),
        None => println!("Peer set to {addr}"),
    }

    match super::controller(&settings).connect(None) {
        ConnectOutcome::Connected => println!("Connected to {addr}."),
        ConnectOutcome::Failed(msg) => println!("Saved, but {addr} did not answer: {msg}"),
        _ => {}
    }
    Ok(())
}
