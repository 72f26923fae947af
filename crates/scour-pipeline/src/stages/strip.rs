//! Script stripping over an output tree.

use std::fs;
use std::path::PathBuf;

use scour_markup::{strip_scripts, StripOptions, StripStats};

use crate::error::PipelineError;
use crate::outcome::BatchReport;
use crate::tree::OutputTree;

/// Configuration for the strip stage.
#[derive(Debug, Clone)]
pub struct StripConfig {
    /// Remove script files after stripping markup
    pub delete_scripts: bool,

    /// Extensions of script files to remove
    pub script_extensions: Vec<String>,

    /// Ids of hydration-data elements to remove
    pub hydration_ids: Vec<String>,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            delete_scripts: true,
            script_extensions: vec!["js".to_string(), "mjs".to_string(), "cjs".to_string()],
            hydration_ids: StripOptions::default().hydration_ids,
        }
    }
}

/// Result of the strip stage.
#[derive(Debug, Default)]
pub struct StripReport {
    pub pages: BatchReport<StripStats>,
    pub deleted: BatchReport<()>,
}

/// Remove script markup from every page, then delete script files.
pub fn run_strip(root: impl Into<PathBuf>, config: &StripConfig) -> Result<StripReport, PipelineError> {
    let tree = OutputTree::open(root)?;
    let options = StripOptions {
        hydration_ids: config.hydration_ids.clone(),
    };

    let mut report = StripReport::default();

    for path in tree.html_files() {
        let rel = tree.relative(&path).to_path_buf();
        let html = match fs::read_to_string(&path) {
            Ok(html) => html,
            Err(e) => {
                report.pages.failed(rel, e);
                continue;
            }
        };

        let (stripped, stats) = strip_scripts(&html, &options);
        if let Err(e) = fs::write(&path, stripped) {
            report.pages.failed(rel, e);
            continue;
        }

        tracing::info!("Stripped {} ({} removals)", rel.display(), stats.total());
        report.pages.processed(rel, stats);
    }

    if config.delete_scripts {
        let extensions: Vec<&str> = config.script_extensions.iter().map(String::as_str).collect();
        for path in tree.files_with_ext(&extensions) {
            let rel = tree.relative(&path).to_path_buf();
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!("Deleted {}", rel.display());
                    report.deleted.processed(rel, ());
                }
                Err(e) => report.deleted.failed(rel, e),
            }
        }
    }

    let removals: usize = report.pages.successes().map(|(_, s)| s.total()).sum();
    tracing::info!(
        "Strip complete: {} pages, {} removals, {} script files deleted, {} failures",
        report.pages.success_count(),
        removals,
        report.deleted.success_count(),
        report.pages.failure_count() + report.deleted.failure_count()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn strips_pages_and_deletes_scripts() {
        let temp = tempdir().unwrap();
        let out = temp.path();
        fs::create_dir_all(out.join("_next/static/chunks")).unwrap();
        fs::write(
            out.join("index.html"),
            r#"<html><head><script src="/_next/static/chunks/main.js"></script></head><body><button onclick="go()">Go</button></body></html>"#,
        )
        .unwrap();
        fs::write(out.join("_next/static/chunks/main.js"), "console.log(1)").unwrap();
        fs::write(out.join("_next/static/chunks/worker.MJS"), "").unwrap();
        fs::write(out.join("data.json"), "{}").unwrap();

        let report = run_strip(out, &StripConfig::default()).unwrap();

        assert_eq!(
            fs::read_to_string(out.join("index.html")).unwrap(),
            "<html><head></head><body><button>Go</button></body></html>"
        );
        assert_eq!(report.pages.success_count(), 1);
        assert_eq!(report.deleted.success_count(), 2);
        assert!(!out.join("_next/static/chunks/main.js").exists());
        assert!(out.join("data.json").exists());
    }

    #[test]
    fn keeps_script_files_when_disabled() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("app.js"), "").unwrap();

        let config = StripConfig {
            delete_scripts: false,
            ..Default::default()
        };
        let report = run_strip(temp.path(), &config).unwrap();

        assert!(temp.path().join("app.js").exists());
        assert_eq!(report.deleted.success_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn leaves_scripts_behind_symlinks_alone() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("precious.js"), "keep()").unwrap();
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("app.js"), "").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("shared")).unwrap();

        let report = run_strip(temp.path(), &StripConfig::default()).unwrap();

        assert!(outside.path().join("precious.js").exists());
        assert!(!temp.path().join("app.js").exists());
        assert_eq!(report.deleted.success_count(), 1);
    }

    #[test]
    fn fails_on_missing_output_dir() {
        let temp = tempdir().unwrap();

        let err = run_strip(temp.path().join("out"), &StripConfig::default()).unwrap_err();

        assert!(matches!(err, PipelineError::MissingOutputDir(_)));
    }
}
