//! `set` subcommand — apply FIELD=VALUE edits and push one `config`.

use super::{ConfigField, DeviceCommand, GlobalOpts, LedlinkError, Result, Rgb, color};

/// One parsed command-line edit.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Edit {
    Field(ConfigField, String),
    /// `color=...` sets all three solid channels at once.
    Solid(Rgb),
}

pub(super) fn parse_assignment(s: &str) -> Result<Edit> {
    let Some((key, value)) = s.split_once('=') else {
        return Err(LedlinkError::Config(format!(
            "expected FIELD=VALUE, got \"{s}\""
        )));
    };
    let key = key.trim();
    if key.eq_ignore_ascii_case("color") {
        return Ok(Edit::Solid(color::parse_color(value)?));
    }
    let field: ConfigField = key.parse()?;
    Ok(Edit::Field(field, value.trim().to_string()))
}

pub(super) fn cmd_set(opts: &GlobalOpts, assignments: &[String]) -> Result<()> {
    // Reject typos before touching the network.
    let edits = assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>>>()?;

    let ctrl = super::connected(opts)?;
    for edit in &edits {
        match edit {
            Edit::Field(field, value) => ctrl.update_config(*field, value)?,
            Edit::Solid(c) => ctrl.edit_config(|cfg| {
                cfg.solid_r = c.r;
                cfg.solid_g = c.g;
                cfg.solid_b = c.b;
            }),
        }
    }
    ctrl.send_immediate(DeviceCommand::Config(ctrl.config().normalized()))?;
    println!(
        "Updated {} field{} on {}.",
        edits.len(),
        if edits.len() == 1 { "" } else { "s" },
        ctrl.peer()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_assignment() {
        assert_eq!(
            parse_assignment("bright=200").unwrap(),
            Edit::Field(ConfigField::Bright, "200".into())
        );
        assert_eq!(
            parse_assignment(" Effect = comet").unwrap(),
            Edit::Field(ConfigField::Effect, "comet".into())
        );
    }

    #[test]
    fn parse_color_assignment() {
        assert_eq!(
            parse_assignment("color=#FF8000").unwrap(),
            Edit::Solid(Rgb::new(255, 128, 0))
        );
        assert!(parse_assignment("color=nope").is_err());
    }

    #[test]
    fn parse_rejects_missing_equals_and_unknown_field() {
        assert!(parse_assignment("bright").is_err());
        assert!(parse_assignment("speed=3").is_err());
    }
}
