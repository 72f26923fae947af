//! Stylesheet optimization command.

use std::path::Path;

use anyhow::{Context, Result};
use scour_pipeline::run_styles;

use crate::config::load_config;

/// Run the styles command.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::info!("Starting CSS optimization in {}", config.out_dir().display());

    run_styles(config.out_dir(), &config.styles()).context("Failed to optimize CSS")?;

    tracing::info!("CSS optimization complete!");
    Ok(())
}
