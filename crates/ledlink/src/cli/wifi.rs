//! `wifi` subcommand — edit the device's stored networks and commit them.
//!
//! Indices on the command line are 1-based, as printed by `wifi list`.

use clap::Subcommand;
use ledlink_lib::networks::{CredentialField, MoveDirection};

use super::{
    Controller, GlobalOpts, LedlinkError, NetworkJson, NetworksOutput, Result, confirm, print_json,
};

#[derive(Subcommand)]
pub enum WifiAction {
    /// List stored networks
    List,

    /// Add a network
    Add { ssid: String, pass: String },

    /// Change the SSID or password of a network
    Edit {
        index: usize,
        /// `ssid` or `pass`
        #[arg(value_parser = parse_field)]
        field: CredentialField,
        value: String,
    },

    /// Remove a network
    Remove {
        index: usize,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Move a network up or down in the priority list
    Move {
        index: usize,
        /// `up` or `down`
        #[arg(value_parser = parse_direction)]
        direction: MoveDirection,
    },
}

fn parse_field(s: &str) -> std::result::Result<CredentialField, String> {
    s.parse().map_err(|e: LedlinkError| e.to_string())
}

fn parse_direction(s: &str) -> std::result::Result<MoveDirection, String> {
    s.parse().map_err(|e: LedlinkError| e.to_string())
}

/// 1-based CLI index → 0-based list index, checked against the list.
fn to_index(ctrl: &Controller, index: usize) -> Result<usize> {
    let count = ctrl.networks().len();
    if index == 0 || index > count {
        return Err(LedlinkError::Config(format!(
            "no network #{index} (device has {count})"
        )));
    }
    Ok(index - 1)
}

fn print_list(ctrl: &Controller, json: bool) -> Result<()> {
    let networks = ctrl.networks();
    if json {
        return print_json(&NetworksOutput {
            count: networks.len(),
            networks: networks
                .iter()
                .enumerate()
                .map(|(i, n)| NetworkJson {
                    index: i + 1,
                    ssid: n.ssid.clone(),
                    has_password: !n.pass.is_empty(),
                })
                .collect(),
        });
    }
    if networks.is_empty() {
        println!("No networks stored.");
        return Ok(());
    }
    for (i, n) in networks.iter().enumerate() {
        let ssid = if n.ssid.is_empty() { "(empty)" } else { &n.ssid };
        println!("  [{}] {ssid}", i + 1);
    }
    Ok(())
}

pub(super) fn cmd_wifi(opts: &GlobalOpts, action: WifiAction) -> Result<()> {
    let ctrl = super::connected(opts)?;

    match action {
        WifiAction::List => return print_list(&ctrl, opts.json),
        WifiAction::Add { ssid, pass } => {
            let i = ctrl.add_network();
            ctrl.update_network(i, CredentialField::Ssid, &ssid);
            ctrl.update_network(i, CredentialField::Pass, &pass);
        }
        WifiAction::Edit {
            index,
            field,
            value,
        } => {
            let i = to_index(&ctrl, index)?;
            ctrl.update_network(i, field, &value);
        }
        WifiAction::Remove { index, yes } => {
            let i = to_index(&ctrl, index)?;
            ctrl.request_network_removal(i);
            let ssid = ctrl.networks()[i].ssid.clone();
            if !yes && !confirm(&format!("Remove network \"{ssid}\"?")) {
                ctrl.cancel_network_removal();
                println!("Aborted.");
                return Ok(());
            }
            ctrl.confirm_network_removal(i);
        }
        WifiAction::Move { index, direction } => {
            let i = to_index(&ctrl, index)?;
            if !ctrl.move_network(i, direction) {
                let end = match direction {
                    MoveDirection::Up => "top",
                    MoveDirection::Down => "bottom",
                };
                println!("Already at the {end}.");
                return Ok(());
            }
        }
    }

    ctrl.commit_networks()?;
    println!("{}", ctrl.status());
    print_list(&ctrl, false)
}
