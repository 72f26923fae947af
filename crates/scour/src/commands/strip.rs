//! Script stripping command.

use std::path::Path;

use anyhow::{Context, Result};
use scour_pipeline::run_strip;

use crate::config::load_config;

/// Run the strip command.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::info!("Stripping JavaScript from {}", config.out_dir().display());

    run_strip(config.out_dir(), &config.strip()).context("Failed to strip JavaScript")?;

    tracing::info!("JavaScript stripping complete!");
    Ok(())
}
