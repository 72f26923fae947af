//! Stylesheet optimization over an output tree.
//!
//! Runs three steps in order: purge and minify every stylesheet against the
//! markup of the whole site, inline per-page critical CSS, then make the
//! remaining stylesheet links load without blocking render.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scour_styles::{
    create_renderer, defer_stylesheets, extract_critical, fold_usage, inline_critical,
    purge_css, stylesheet_hrefs, ExtractedSheet, FoldRenderer, RendererKind, Safelist,
    UsageIndex, Viewport, DEFAULT_VIEWPORTS,
};

use crate::error::PipelineError;
use crate::outcome::BatchReport;
use crate::tree::OutputTree;

/// Configuration for the styles stage.
#[derive(Debug, Clone)]
pub struct StylesConfig {
    /// Names always treated as used
    pub safelist: Vec<String>,

    /// Regex patterns always treated as used
    pub safelist_patterns: Vec<String>,

    /// How above-the-fold elements are found
    pub renderer: RendererKind,

    /// Per-page render timeout
    pub render_timeout: Duration,

    /// Viewports the critical CSS must cover
    pub viewports: Vec<Viewport>,

    /// Write each page's critical CSS next to it
    pub keep_critical_artifacts: bool,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            safelist: vec!["html".to_string(), "body".to_string()],
            safelist_patterns: Vec::new(),
            renderer: RendererKind::default(),
            render_timeout: Duration::from_secs(60),
            viewports: DEFAULT_VIEWPORTS.to_vec(),
            keep_critical_artifacts: false,
        }
    }
}

/// Size change of a purged stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeMetrics {
    pub original_bytes: usize,
    pub purged_bytes: usize,
    pub selectors_removed: usize,
}

/// Critical CSS inlined into a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalMetrics {
    /// Stylesheets the CSS was taken from
    pub sheets: usize,

    /// Stylesheets whose every rule was critical
    pub complete_sheets: usize,

    pub inlined_bytes: usize,
}

/// Result of the styles stage.
#[derive(Debug, Default)]
pub struct StylesReport {
    pub purged: BatchReport<PurgeMetrics>,
    pub critical: BatchReport<CriticalMetrics>,
    /// Links made non-blocking per page
    pub deferred: BatchReport<usize>,
}

/// Run the styles stage with the renderer named in the config.
pub fn run_styles(
    root: impl Into<PathBuf>,
    config: &StylesConfig,
) -> Result<StylesReport, PipelineError> {
    let tree = OutputTree::open(root)?;
    let renderer = create_renderer(config.renderer, config.render_timeout, tree.root())?;
    tracing::debug!("Finding above-the-fold content with the {} renderer", renderer.name());
    optimize_styles(&tree, config, renderer.as_ref())
}

/// Run the styles stage with a given renderer.
pub fn optimize_styles(
    tree: &OutputTree,
    config: &StylesConfig,
    renderer: &dyn FoldRenderer,
) -> Result<StylesReport, PipelineError> {
    let safelist = Safelist::new(config.safelist.iter().cloned(), &config.safelist_patterns)?;
    let pages = tree.html_files();
    let stylesheets = tree.css_files();

    tracing::info!(
        "Found {} HTML files and {} CSS files",
        pages.len(),
        stylesheets.len()
    );

    let mut report = StylesReport::default();

    let usage = collect_usage(tree, &pages);
    for path in &stylesheets {
        purge_stylesheet(tree, path, &usage, &safelist, &mut report.purged);
    }

    for page in &pages {
        inline_page(tree, page, config, renderer, &safelist, &mut report.critical);
    }

    for page in &pages {
        defer_page(tree, page, &mut report.deferred);
    }

    tracing::info!(
        "Styles complete: {} stylesheets purged, {} pages with critical CSS, {} failures",
        report.purged.success_count(),
        report.critical.success_count(),
        report.purged.failure_count()
            + report.critical.failure_count()
            + report.deferred.failure_count()
    );

    Ok(report)
}

/// Union of everything used by every page.
fn collect_usage(tree: &OutputTree, pages: &[PathBuf]) -> UsageIndex {
    let mut usage = UsageIndex::new();
    for page in pages {
        match fs::read_to_string(page) {
            Ok(html) => usage.scan_html(&html),
            Err(e) => {
                tracing::warn!("Skipping {} for usage: {}", tree.relative(page).display(), e)
            }
        }
    }
    tracing::debug!(
        "Usage: {} tags, {} classes, {} ids",
        usage.tags.len(),
        usage.classes.len(),
        usage.ids.len()
    );
    usage
}

fn purge_stylesheet(
    tree: &OutputTree,
    path: &Path,
    usage: &UsageIndex,
    safelist: &Safelist,
    report: &mut BatchReport<PurgeMetrics>,
) {
    let rel = tree.relative(path).to_path_buf();
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => return report.failed(rel, e),
    };

    let purged = match purge_css(&source, &rel.display().to_string(), usage, safelist) {
        Ok(purged) => purged,
        Err(e) => return report.failed(rel, e),
    };

    if let Err(e) = fs::write(path, &purged.css) {
        return report.failed(rel, e);
    }

    tracing::info!(
        "Optimized: {} ({} -> {} bytes)",
        rel.display(),
        source.len(),
        purged.css.len()
    );
    report.processed(
        rel,
        PurgeMetrics {
            original_bytes: source.len(),
            purged_bytes: purged.css.len(),
            selectors_removed: purged.stats.removed,
        },
    );
}

fn inline_page(
    tree: &OutputTree,
    page: &Path,
    config: &StylesConfig,
    renderer: &dyn FoldRenderer,
    safelist: &Safelist,
    report: &mut BatchReport<CriticalMetrics>,
) {
    let rel = tree.relative(page).to_path_buf();
    match critical_for_page(tree, page, config, renderer, safelist) {
        Ok(Some(metrics)) => {
            tracing::info!("Inlined critical CSS: {}", rel.display());
            report.processed(rel, metrics);
        }
        Ok(None) => tracing::debug!("No local stylesheets in {}", rel.display()),
        Err(e) => report.failed(rel, e),
    }
}

/// Extract and inline critical CSS for one page.
///
/// Returns `None` when the page links no stylesheet inside the tree.
fn critical_for_page(
    tree: &OutputTree,
    page: &Path,
    config: &StylesConfig,
    renderer: &dyn FoldRenderer,
    safelist: &Safelist,
) -> Result<Option<CriticalMetrics>, PipelineError> {
    let html = fs::read_to_string(page).map_err(|e| PipelineError::io(page, e))?;

    let linked: Vec<(String, PathBuf)> = stylesheet_hrefs(&html)
        .into_iter()
        .filter_map(|href| {
            let resolved = tree.resolve_href(page, &href);
            if resolved.is_none() {
                tracing::debug!("Not a local stylesheet: {}", href);
            }
            resolved.map(|path| (href, path))
        })
        .filter(|(href, path)| {
            let exists = path.is_file();
            if !exists {
                tracing::warn!("{}: stylesheet {} not found", tree.relative(page).display(), href);
            }
            exists
        })
        .collect();

    if linked.is_empty() {
        return Ok(None);
    }

    let fold = fold_usage(renderer, page, &html, &config.viewports)?;

    let mut sheets = Vec::with_capacity(linked.len());
    for (href, path) in linked {
        let source = fs::read_to_string(&path).map_err(|e| PipelineError::io(&path, e))?;
        let rel = tree.relative(&path);
        let url_base = url_directory(rel);
        let critical = extract_critical(&source, &rel.display().to_string(), &url_base, &fold, safelist)?;
        sheets.push(ExtractedSheet { href, critical });
    }

    let inlined = inline_critical(&html, &sheets);
    fs::write(page, &inlined).map_err(|e| PipelineError::io(page, e))?;

    let css: String = sheets.iter().map(|s| s.critical.css.as_str()).collect();
    if config.keep_critical_artifacts {
        let artifact = artifact_path(page);
        fs::write(&artifact, &css).map_err(|e| PipelineError::io(&artifact, e))?;
    }

    Ok(Some(CriticalMetrics {
        sheets: sheets.len(),
        complete_sheets: sheets.iter().filter(|s| s.critical.complete).count(),
        inlined_bytes: css.len(),
    }))
}

/// `css/app.css` is served from `/css/`.
fn url_directory(rel: &Path) -> String {
    let segments: Vec<String> = rel
        .parent()
        .into_iter()
        .flat_map(|dir| dir.components())
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

/// `blog/index.html` keeps its critical CSS in `blog/index.critical.css`.
fn artifact_path(page: &Path) -> PathBuf {
    let stem = page
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    page.with_file_name(format!("{}.critical.css", stem))
}

fn defer_page(tree: &OutputTree, page: &Path, report: &mut BatchReport<usize>) {
    let rel = tree.relative(page).to_path_buf();
    let html = match fs::read_to_string(page) {
        Ok(html) => html,
        Err(e) => return report.failed(rel, e),
    };

    let (deferred, count) = defer_stylesheets(&html);
    if count > 0 {
        if let Err(e) = fs::write(page, deferred) {
            return report.failed(rel, e);
        }
        tracing::info!("Updated: {} ({} async stylesheets)", rel.display(), count);
    }
    report.processed(rel, count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scour_styles::StyleError;
    use tempfile::tempdir;

    /// Treats a fixed set of classes as visible at every viewport.
    struct VisibleClasses(&'static [&'static str]);

    impl FoldRenderer for VisibleClasses {
        fn above_fold(
            &self,
            _page: &Path,
            _html: &str,
            _viewport: Viewport,
        ) -> Result<UsageIndex, StyleError> {
            let mut usage = UsageIndex::new();
            usage.tags.insert("header".to_string());
            usage
                .classes
                .extend(self.0.iter().map(|c| c.to_string()));
            Ok(usage)
        }
    }

    const PAGE: &str = r#"<html><head><link rel="stylesheet" href="/css/app.css"></head><body><header class="hero">Hi</header><footer class="foot">Bye</footer></body></html>"#;

    fn site() -> (tempfile::TempDir, OutputTree) {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("index.html"), PAGE).unwrap();
        fs::write(
            temp.path().join("css/app.css"),
            ".hero { color: red; }\n.foot { color: #00f; }\n.unused { color: green; }\n",
        )
        .unwrap();
        let tree = OutputTree::open(temp.path()).unwrap();
        (temp, tree)
    }

    #[test]
    fn purges_inlines_and_defers() {
        let (temp, tree) = site();

        let report = optimize_styles(&tree, &StylesConfig::default(), &VisibleClasses(&["hero"]))
            .unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("css/app.css")).unwrap(),
            ".hero{color:red}.foot{color:#00f}"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("index.html")).unwrap(),
            r#"<html><head><style data-critical>.hero{color:red}</style><link rel="stylesheet" href="/css/app.css" media="print" onload="this.media='all'"><noscript><link rel="stylesheet" href="/css/app.css"></noscript></head><body><header class="hero">Hi</header><footer class="foot">Bye</footer></body></html>"#
        );
        assert_eq!(report.purged.success_count(), 1);
        assert_eq!(report.critical.success_count(), 1);
        assert!(!temp.path().join("index.critical.css").exists());
    }

    #[test]
    fn defers_link_of_fully_critical_stylesheet() {
        let (temp, tree) = site();

        let report = optimize_styles(
            &tree,
            &StylesConfig::default(),
            &VisibleClasses(&["hero", "foot"]),
        )
        .unwrap();

        let html = fs::read_to_string(temp.path().join("index.html")).unwrap();
        assert!(html.contains("<style data-critical>.hero{color:red}.foot{color:#00f}</style>"));
        assert!(html.contains(r#"media="print""#));
        assert_eq!(html.matches("<noscript>").count(), 1);

        let (_, metrics) = report.critical.successes().next().unwrap();
        assert_eq!(metrics.complete_sheets, 1);
    }

    #[test]
    fn keeps_critical_artifact_when_asked() {
        let (temp, tree) = site();
        let config = StylesConfig {
            keep_critical_artifacts: true,
            ..Default::default()
        };

        optimize_styles(&tree, &config, &VisibleClasses(&["hero"])).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("index.critical.css")).unwrap(),
            ".hero{color:red}"
        );
    }

    #[test]
    fn inlined_urls_resolve_from_the_page() {
        let (temp, tree) = site();
        fs::create_dir_all(temp.path().join("blog")).unwrap();
        fs::write(
            temp.path().join("blog/post.html"),
            r#"<head><link rel="stylesheet" href="../css/app.css"></head><body><header class="hero">Hi</header></body>"#,
        )
        .unwrap();
        fs::write(
            temp.path().join("css/app.css"),
            ".hero { background: url(hero.png); }\n.foot { color: #00f; }\n",
        )
        .unwrap();

        optimize_styles(&tree, &StylesConfig::default(), &VisibleClasses(&["hero"])).unwrap();

        let post = fs::read_to_string(temp.path().join("blog/post.html")).unwrap();
        assert!(post.contains("/css/hero.png"));
        let purged = fs::read_to_string(temp.path().join("css/app.css")).unwrap();
        assert!(purged.contains("hero.png"));
        assert!(!purged.contains("/css/hero.png"));
    }

    #[test]
    fn stylesheet_url_directories() {
        assert_eq!(url_directory(Path::new("app.css")), "/");
        assert_eq!(url_directory(Path::new("css/app.css")), "/css/");
        assert_eq!(url_directory(Path::new("assets/css/app.css")), "/assets/css/");
    }

    #[test]
    fn continues_past_broken_stylesheet() {
        let (temp, tree) = site();
        fs::write(temp.path().join("css/broken.css"), "..{}").unwrap();

        let report = optimize_styles(&tree, &StylesConfig::default(), &VisibleClasses(&["hero"]))
            .unwrap();

        assert_eq!(report.purged.failure_count(), 1);
        assert_eq!(report.purged.success_count(), 1);
        assert_eq!(report.critical.success_count(), 1);
    }

    #[test]
    fn skips_external_stylesheets() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("index.html"),
            r#"<head><link rel="stylesheet" href="https://fonts.example.com/inter.css"></head>"#,
        )
        .unwrap();
        let tree = OutputTree::open(temp.path()).unwrap();

        let report =
            optimize_styles(&tree, &StylesConfig::default(), &VisibleClasses(&[])).unwrap();

        let html = fs::read_to_string(temp.path().join("index.html")).unwrap();
        assert_eq!(report.critical.success_count(), 0);
        assert!(!html.contains("data-critical"));
        assert!(html.contains(r#"media="print""#));
    }

    #[test]
    fn rejects_invalid_safelist_pattern() {
        let (_temp, tree) = site();
        let config = StylesConfig {
            safelist_patterns: vec!["(".to_string()],
            ..Default::default()
        };

        let err = optimize_styles(&tree, &config, &VisibleClasses(&[])).unwrap_err();

        assert!(matches!(err, PipelineError::Style(StyleError::PatternError(_))));
    }

    #[test]
    fn artifact_sits_next_to_page() {
        assert_eq!(
            artifact_path(Path::new("out/blog/index.html")),
            PathBuf::from("out/blog/index.critical.css")
        );
    }
}
