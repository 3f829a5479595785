//! Config command - show and validate the resolved configuration.

use anyhow::Result;
use std::path::Path;
use warden_config::{Config, ShowFormat};

use crate::theme::Theme;

/// Print the resolved configuration with source annotations.
pub(crate) fn show_config(
    explicit: Option<&Path>,
    format: &str,
    section: Option<&str>,
) -> Result<()> {
    let resolved = Config::load(explicit)?;

    let show_format = match format {
        "json" => ShowFormat::Json,
        _ => ShowFormat::Toml,
    };

    let output = resolved
        .show(show_format, section)
        .map_err(|e| anyhow::anyhow!("failed to format config: {e}"))?;

    println!("{output}");
    Ok(())
}

/// Load and validate the configuration, listing the files that were read.
pub(crate) fn validate_config(explicit: Option<&Path>) -> Result<()> {
    let resolved = Config::load(explicit)?;
    println!("{}", Theme::success("Configuration is valid."));
    if !resolved.loaded_files.is_empty() {
        println!("\nLoaded files:");
        for path in &resolved.loaded_files {
            println!("  - {path}");
        }
    }
    Ok(())
}
