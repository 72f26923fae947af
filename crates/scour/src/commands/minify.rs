//! HTML minification command.

use std::path::Path;

use anyhow::{Context, Result};
use scour_pipeline::run_minify;

use crate::config::load_config;

/// Run the minify command.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::info!("Starting HTML minification in {}", config.out_dir().display());

    run_minify(config.out_dir(), &config.minify()).context("Failed to minify HTML")?;

    tracing::info!("HTML minification complete!");
    Ok(())
}
