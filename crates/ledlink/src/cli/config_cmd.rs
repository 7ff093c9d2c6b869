//! `config` subcommand — show the settings file location and values.

use super::{Config, ConfigOutput, GlobalOpts, Result, kv, kv_indent, kv_width, print_json};

pub(super) fn cmd_config(opts: &GlobalOpts) -> Result<()> {
    let config = super::settings(opts);
    let config_path = opts.config_path.clone().or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    };

    if opts.json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        });
    }

    let w = kv_width(
        &["Config file:"],
        &[
            "peer:",
            "port:",
            "sync_interval_ms:",
            "reply_timeout_ms:",
            "scan_window_ms:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("peer:", &config.peer, w);
    kv_indent("port:", config.port, w);
    kv_indent("sync_interval_ms:", config.sync_interval_ms, w);
    kv_indent("reply_timeout_ms:", config.reply_timeout_ms, w);
    kv_indent("scan_window_ms:", config.scan_window_ms, w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
