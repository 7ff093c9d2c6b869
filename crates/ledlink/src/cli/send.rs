//! `on`, `off`, `save` subcommands — discrete commands, no connect needed.

use super::{DeviceCommand, GlobalOpts, Result};

pub(super) fn cmd_send(opts: &GlobalOpts, command: DeviceCommand) -> Result<()> {
    let settings = super::settings(opts);
    let ctrl = super::controller(&settings);
    let tag = command.tag();
    ctrl.send_immediate(command)?;
    if opts.json {
        println!("{}", serde_json::json!({ "peer": settings.peer, "sent": tag }));
    } else {
        println!("Sent {tag} to {}.", settings.peer);
    }
    Ok(())
}
