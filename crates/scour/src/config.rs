//! Configuration file (scour.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use scour_markup::MinifyOptions;
use scour_pipeline::{StripConfig, StylesConfig};
use scour_styles::RendererKind;

/// Configuration file structure. Every section and key is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub site: SiteSection,
    pub strip: StripSection,
    pub styles: StylesSection,
    pub minify: MinifySection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Exported site, relative to the config file
    pub out_dir: PathBuf,

    /// Command that exports the site; empty to skip
    pub build_command: Vec<String>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            build_command: vec!["npm".to_string(), "run".to_string(), "build".to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StripSection {
    pub delete_scripts: bool,
    pub script_extensions: Vec<String>,
    pub hydration_ids: Vec<String>,
}

impl Default for StripSection {
    fn default() -> Self {
        let defaults = StripConfig::default();
        Self {
            delete_scripts: defaults.delete_scripts,
            script_extensions: defaults.script_extensions,
            hydration_ids: defaults.hydration_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesSection {
    pub safelist: Vec<String>,
    pub safelist_patterns: Vec<String>,
    pub renderer: RendererKind,
    pub render_timeout_secs: u64,
    pub keep_critical_artifacts: bool,
}

impl Default for StylesSection {
    fn default() -> Self {
        let defaults = StylesConfig::default();
        Self {
            safelist: defaults.safelist,
            safelist_patterns: defaults.safelist_patterns,
            renderer: defaults.renderer,
            render_timeout_secs: defaults.render_timeout.as_secs(),
            keep_critical_artifacts: defaults.keep_critical_artifacts,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifySection {
    pub minify_css: bool,
    pub minify_js: bool,
    pub keep_comments: bool,
}

impl Default for MinifySection {
    fn default() -> Self {
        let defaults = MinifyOptions::default();
        Self {
            minify_css: defaults.minify_css,
            minify_js: defaults.minify_js,
            keep_comments: defaults.keep_comments,
        }
    }
}

/// A loaded config and the directory its relative paths start from.
#[derive(Debug)]
pub struct Config {
    pub file: ConfigFile,
    pub project_dir: PathBuf,
}

impl Config {
    pub fn out_dir(&self) -> PathBuf {
        self.project_dir.join(&self.file.site.out_dir)
    }

    pub fn strip(&self) -> StripConfig {
        let section = &self.file.strip;
        StripConfig {
            delete_scripts: section.delete_scripts,
            script_extensions: section.script_extensions.clone(),
            hydration_ids: section.hydration_ids.clone(),
        }
    }

    pub fn styles(&self) -> StylesConfig {
        let section = &self.file.styles;
        StylesConfig {
            safelist: section.safelist.clone(),
            safelist_patterns: section.safelist_patterns.clone(),
            renderer: section.renderer,
            render_timeout: Duration::from_secs(section.render_timeout_secs),
            keep_critical_artifacts: section.keep_critical_artifacts,
            ..StylesConfig::default()
        }
    }

    pub fn minify(&self) -> MinifyOptions {
        let section = &self.file.minify;
        MinifyOptions {
            minify_css: section.minify_css,
            minify_js: section.minify_js,
            keep_comments: section.keep_comments,
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<Config> {
    let project_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let file = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        file
    } else {
        tracing::info!("No {} found, using defaults", path.display());
        ConfigFile::default()
    };

    Ok(Config { file, project_dir })
}
