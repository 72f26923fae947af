//! HTML minification over an output tree.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use scour_markup::{minify_html, MinifyOptions};

use crate::error::PipelineError;
use crate::outcome::BatchReport;
use crate::tree::OutputTree;

/// Size change of one minified page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinifyMetrics {
    pub original_bytes: usize,
    pub minified_bytes: usize,

    /// Percentage saved, rounded to two decimals
    pub reduction_percent: f64,
}

impl MinifyMetrics {
    pub fn new(original_bytes: usize, minified_bytes: usize) -> Self {
        Self {
            original_bytes,
            minified_bytes,
            reduction_percent: round2(reduction(original_bytes, minified_bytes)),
        }
    }
}

/// Totals over every page that was minified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinifySummary {
    pub files: usize,
    pub total_original_bytes: usize,
    pub total_minified_bytes: usize,
    pub total_reduction_percent: f64,
    pub average_reduction_percent: f64,
}

impl MinifySummary {
    /// Summarize a report, or `None` when no page succeeded.
    pub fn from_report(report: &BatchReport<MinifyMetrics>) -> Option<Self> {
        let metrics: Vec<&MinifyMetrics> = report.successes().map(|(_, m)| m).collect();
        if metrics.is_empty() {
            return None;
        }

        let total_original_bytes = metrics.iter().map(|m| m.original_bytes).sum();
        let total_minified_bytes = metrics.iter().map(|m| m.minified_bytes).sum();
        let average = metrics.iter().map(|m| m.reduction_percent).sum::<f64>() / metrics.len() as f64;

        Some(Self {
            files: metrics.len(),
            total_original_bytes,
            total_minified_bytes,
            total_reduction_percent: reduction(total_original_bytes, total_minified_bytes),
            average_reduction_percent: average,
        })
    }
}

impl fmt::Display for MinifySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total original size: {} bytes", self.total_original_bytes)?;
        writeln!(f, "Total minified size: {} bytes", self.total_minified_bytes)?;
        writeln!(f, "Total reduction: {:.2}%", self.total_reduction_percent)?;
        write!(f, "Average reduction: {:.2}%", self.average_reduction_percent)
    }
}

fn reduction(original: usize, minified: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - minified as f64) / original as f64 * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Minify every page in place.
pub fn run_minify(
    root: impl Into<PathBuf>,
    options: &MinifyOptions,
) -> Result<BatchReport<MinifyMetrics>, PipelineError> {
    let tree = OutputTree::open(root)?;
    let pages = tree.html_files();
    tracing::info!("Minifying {} HTML files...", pages.len());

    let mut report = BatchReport::new();
    for path in pages {
        let rel = tree.relative(&path).to_path_buf();

        let html = match fs::read_to_string(&path) {
            Ok(html) => html,
            Err(e) => {
                report.failed(rel, e);
                continue;
            }
        };
        let minified = match minify_html(&html, options) {
            Ok(minified) => minified,
            Err(e) => {
                report.failed(rel, e);
                continue;
            }
        };
        if let Err(e) = fs::write(&path, &minified) {
            report.failed(rel, e);
            continue;
        }

        let metrics = MinifyMetrics::new(html.len(), minified.len());
        tracing::info!(
            "Minified: {} ({} -> {} bytes, {:.2}% reduction)",
            rel.display(),
            metrics.original_bytes,
            metrics.minified_bytes,
            metrics.reduction_percent
        );
        report.processed(rel, metrics);
    }

    match MinifySummary::from_report(&report) {
        Some(summary) => {
            for line in summary.to_string().lines() {
                tracing::info!("{}", line);
            }
        }
        None => tracing::info!("No files were processed successfully."),
    }

    Ok(report)
}
