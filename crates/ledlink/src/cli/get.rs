//! `get` subcommand — connect and print the device configuration.

use super::{
    ConfigField, DeviceOutput, Effect, GlobalOpts, Result, Rgb, color, kv, kv_indent, kv_width,
    print_json,
};

pub(super) fn cmd_get(opts: &GlobalOpts) -> Result<()> {
    let ctrl = super::connected(opts)?;
    let config = ctrl.config();
    let effect = Effect::from_index(config.effect);

    if opts.json {
        return print_json(&DeviceOutput {
            peer: ctrl.peer(),
            state: ctrl.state().to_string(),
            effect_name: effect.map(Effect::name),
            config,
        });
    }

    let names: Vec<String> = ConfigField::ALL.iter().map(|f| format!("{f}:")).collect();
    let mut indent: Vec<&str> = names.iter().map(String::as_str).collect();
    indent.push("solid color:");
    let w = kv_width(&["Peer:", "State:", "Networks:"], &indent);

    kv("Peer:", ctrl.peer(), w);
    kv("State:", ctrl.state(), w);
    println!();

    println!("Configuration:");
    for (field, label) in ConfigField::ALL.iter().zip(&names) {
        let value = config.get(*field);
        match (field, effect) {
            (ConfigField::Effect, Some(e)) => kv_indent(label, format_args!("{value} ({e})"), w),
            _ => kv_indent(label, value, w),
        }
    }
    kv_indent("solid color:", color::format_color(Rgb::from(config.solid_rgb())), w);
    println!();

    let networks = ctrl.networks();
    kv("Networks:", networks.len(), w);
    for (i, n) in networks.iter().enumerate() {
        println!("  [{}] {}", i + 1, n.ssid);
    }
    Ok(())
}
