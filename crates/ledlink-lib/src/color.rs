//! Color parsing and formatting for the solid-color and pixel commands.

use crate::error::{LedlinkError, Result};

/// An 8-bit-per-channel color as the controller expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Rgb { r, g, b }
    }
}

/// Parse a color string.
///
/// Accepts:
/// - Hex: `"#FF5050"`, `"FF5050"`, `"#ff5050"`
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"orange"`, `"yellow"`, `"purple"`, `"cyan"`, `"off"`
pub fn parse_color(s: &str) -> Result<Rgb> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "red" => return Ok(Rgb::new(255, 0, 0)),
        "green" => return Ok(Rgb::new(0, 255, 0)),
        "blue" => return Ok(Rgb::new(0, 0, 255)),
        "white" => return Ok(Rgb::new(255, 255, 255)),
        "orange" => return Ok(Rgb::new(255, 128, 0)),
        "yellow" => return Ok(Rgb::new(255, 255, 0)),
        "purple" => return Ok(Rgb::new(128, 0, 255)),
        "cyan" => return Ok(Rgb::new(0, 255, 255)),
        "off" | "black" => return Ok(Rgb::OFF),
        _ => {}
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(LedlinkError::Color(format!(
            "Invalid color: {s} (use #RRGGBB or a color name)"
        )));
    }
    // from_str_radix tolerates a leading sign
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(LedlinkError::Color(format!("Invalid hex color: {s}")));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| LedlinkError::Color(format!("Invalid hex color: {s}")))?;
    Ok(Rgb::new((val >> 16) as u8, (val >> 8) as u8, val as u8))
}

/// Format a color as `#RRGGBB`.
pub fn format_color(c: Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b)
}
