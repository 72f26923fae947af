//! Write a default configuration file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    write_default_config(config_path, yes)
}

fn write_default_config(config_path: &Path, yes: bool) -> Result<()> {
    if config_path.exists() && !yes {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
        return Ok(());
    }

    fs::write(config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    tracing::info!("Created {}", config_path.display());
    tracing::info!("Run 'scour' to build and optimize the site.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# scour configuration

[site]
# Directory the site generator exports to
out_dir = "out"

# Command that exports the site (empty list to skip)
build_command = ["npm", "run", "build"]

[strip]
# Delete script files after stripping markup
delete_scripts = true
script_extensions = ["js", "mjs", "cjs"]

# Elements holding framework hydration data
hydration_ids = ["__NEXT_DATA__"]

[styles]
# Selectors naming these are never purged
safelist = ["html", "body"]
safelist_patterns = []

# "flow" estimates layout from markup, "chrome" renders in headless Chrome
renderer = "flow"
render_timeout_secs = 60

# Write <page>.critical.css next to each page
keep_critical_artifacts = false

[minify]
minify_css = true
minify_js = true
keep_comments = false
"#;
