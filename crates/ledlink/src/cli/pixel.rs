//! `pixel` subcommand — set a single pixel.

use super::{DeviceCommand, GlobalOpts, Result, Rgb, color};

pub(super) fn cmd_pixel(opts: &GlobalOpts, index: u16, color_arg: Option<&str>) -> Result<()> {
    let (ctrl, rgb) = match color_arg {
        Some(c) => {
            let rgb = color::parse_color(c)?;
            (super::controller(&super::settings(opts)), rgb)
        }
        // The solid color lives on the device; pull it first.
        None => {
            let ctrl = super::connected(opts)?;
            let rgb = Rgb::from(ctrl.config().solid_rgb());
            (ctrl, rgb)
        }
    };

    ctrl.send_immediate(DeviceCommand::Pixel {
        idx: index,
        r: rgb.r,
        g: rgb.g,
        b: rgb.b,
    })?;
    println!("Pixel {index} -> {}", color::format_color(rgb));
    Ok(())
}
