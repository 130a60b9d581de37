//! `elreloc config` - show the resolved configuration
//!
//! Credentials in the DSN are always redacted.

use anyhow::Result;
use elreloc::RelocatorConfig;
use elreloc_logging::{elreloc_home, logs_dir};
use std::path::PathBuf;

/// Arguments for the config command
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Show the resolved configuration in JSON format
    #[arg(long)]
    pub json: bool,

    /// Configuration file (default: ~/.elreloc/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the config command. Shows the configuration even when it does not
/// validate, together with the reason.
pub fn run(args: ConfigArgs) -> Result<()> {
    let home = elreloc_home();
    let (config, source) = RelocatorConfig::resolve_unvalidated(args.config.as_deref())
        .map_err(super::error::HelpfulError::from)?;
    let validation = config.validate().err().map(|e| e.to_string());
    let redacted = config.redacted();

    if args.json {
        let value = serde_json::json!({
            "home": home.to_string_lossy(),
            "logs": logs_dir().to_string_lossy(),
            "config_file": source.as_ref().map(|p| p.to_string_lossy().into_owned()),
            "valid": validation.is_none(),
            "error": validation,
            "config": redacted,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Home:        {}", home.display());
    println!("Logs:        {}", logs_dir().display());
    match &source {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, environment only)"),
    }
    println!();
    print!("{}", toml::to_string_pretty(&redacted)?);
    println!();
    match validation {
        None => println!("Configuration is valid"),
        Some(err) => println!("Configuration is INVALID: {}", err),
    }
    Ok(())
}
