//! Full optimization run.

use std::path::Path;

use anyhow::{Context, Result};
use scour_pipeline::{Orchestrator, ProcessRunner};

use crate::config::load_config;

/// Run the optimize command.
pub async fn run(config_path: &Path, verbose: bool) -> Result<()> {
    let config = load_config(config_path)?;

    let mut runner = ProcessRunner::new(
        config_path,
        config.file.site.build_command.clone(),
        &config.project_dir,
    )?
    .verbose(verbose);

    Orchestrator::new(config.out_dir())
        .run(&mut runner)
        .context("Optimization failed")?;

    Ok(())
}
