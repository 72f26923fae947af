//! Above-the-fold CSS extraction and inlining.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use scour_markup::{rewrite, visit, Edit, StartTag};

use crate::error::StyleError;
use crate::filter::Matcher;
use crate::purge::filter_and_minify;
use crate::render::{FoldRenderer, Viewport};
use crate::usage::{Safelist, UsageIndex};

/// Critical CSS taken from one stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalCss {
    /// Minified rules needed for first paint
    pub css: String,

    /// Whether every selector of the stylesheet was critical
    pub complete: bool,
}

/// A stylesheet link whose CSS was extracted for a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSheet {
    /// The `href` exactly as written in the page
    pub href: String,

    /// What was extracted from it
    pub critical: CriticalCss,
}

/// Render a page at every viewport and merge what lies above the fold.
pub fn fold_usage(
    renderer: &dyn FoldRenderer,
    page: &Path,
    html: &str,
    viewports: &[Viewport],
) -> Result<UsageIndex, StyleError> {
    let mut usage = UsageIndex::new();
    for viewport in viewports {
        let visible = renderer.above_fold(page, html, *viewport)?;
        tracing::debug!(
            "{}: {} tags, {} classes above the fold at {}",
            page.display(),
            visible.tags.len(),
            visible.classes.len(),
            viewport
        );
        usage.merge(&visible);
    }
    Ok(usage)
}

/// Extract the rules of a stylesheet that match above-the-fold elements.
///
/// `html`, `body` and `:root` rules are always critical. Relative URLs are
/// made root-relative to `url_base`, the directory the stylesheet is served
/// from, since the CSS will be inlined into a page elsewhere.
pub fn extract_critical(
    source: &str,
    filename: &str,
    url_base: &str,
    fold: &UsageIndex,
    safelist: &Safelist,
) -> Result<CriticalCss, StyleError> {
    let mut fold = fold.clone();
    fold.tags.insert("html".to_string());
    fold.tags.insert("body".to_string());

    let matcher = Matcher::new(&fold, safelist);
    let purged = filter_and_minify(source, filename, &matcher, Some(url_base))?;

    Ok(CriticalCss {
        css: purged.css,
        complete: purged.stats.removed == 0,
    })
}

/// A closing style tag, which would end the inlined element early.
static STYLE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(style)").expect("Invalid style end regex"));

/// Whether a link is one the critical and async steps manage.
///
/// Links inside `<noscript>` and links marked `data-inline` are left alone.
pub fn is_managed_stylesheet(tag: &StartTag, ancestors: &[String]) -> bool {
    tag.is_stylesheet_link()
        && !tag.has_attr("data-inline")
        && tag.attr("href").is_some_and(|h| !h.trim().is_empty())
        && !ancestors.iter().any(|a| a == "noscript")
}

/// The `href` of every managed stylesheet link, in document order.
pub fn stylesheet_hrefs(html: &str) -> Vec<String> {
    let mut hrefs = Vec::new();
    visit(html, |tag, ancestors| {
        if is_managed_stylesheet(tag, ancestors) {
            if let Some(href) = tag.attr("href") {
                hrefs.push(href.to_string());
            }
        }
    });
    hrefs
}

/// Inline extracted critical CSS into a page.
///
/// The CSS goes into one `<style data-critical>` element placed before the
/// first managed stylesheet link. Links stay in place so the full
/// stylesheets still load.
pub fn inline_critical(html: &str, sheets: &[ExtractedSheet]) -> String {
    let css: String = sheets.iter().map(|s| s.critical.css.as_str()).collect();
    if css.is_empty() {
        return html.to_string();
    }
    let css = STYLE_END_RE.replace_all(&css, r"<\/$1");
    let style = format!("<style data-critical>{}</style>", css);

    let mut placed = false;
    rewrite(html, |tag, ancestors| {
        if placed || !is_managed_stylesheet(tag, ancestors) {
            return Edit::Keep;
        }
        placed = true;
        Edit::InsertBefore(style.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><head><link rel="stylesheet" href="/css/app.css"><noscript><link rel="stylesheet" href="/css/app.css"></noscript><link rel="stylesheet" href="/css/print.css" data-inline></head><body><header class="hero">Hi</header></body></html>"#;

    #[test]
    fn finds_managed_links() {
        assert_eq!(stylesheet_hrefs(PAGE), vec!["/css/app.css".to_string()]);
    }

    #[test]
    fn extracts_only_visible_rules() {
        let fold = UsageIndex::from_html(r#"<header class="hero"></header>"#);
        let css = "body{margin:0}.hero{color:red}.footer{color:blue}";

        let critical = extract_critical(css, "app.css", "/", &fold, &Safelist::default()).unwrap();

        assert_eq!(critical.css, "body{margin:0}.hero{color:red}");
        assert!(!critical.complete);
    }

    #[test]
    fn marks_fully_critical_sheets_complete() {
        let fold = UsageIndex::from_html(r#"<header class="hero"></header>"#);

        let critical =
            extract_critical("html{color:#111}.hero{color:red}", "app.css", "/", &fold, &Safelist::default())
                .unwrap();

        assert!(critical.complete);
    }

    #[test]
    fn rebases_urls_onto_stylesheet_directory() {
        let fold = UsageIndex::from_html(r#"<header class="hero"><h1>Hi</h1></header>"#);
        let css = ".hero{background:url(bg.png)}.hero h1{background:url(../img/logo.svg)}";

        let critical =
            extract_critical(css, "css/app.css", "/css/", &fold, &Safelist::default()).unwrap();

        assert!(critical.css.contains("/css/bg.png"));
        assert!(critical.css.contains("/img/logo.svg"));
        assert!(!critical.css.contains("../"));
    }

    #[test]
    fn escapes_closing_style_tags() {
        let html = r#"<head><link rel="stylesheet" href="/a.css"></head>"#;
        let sheets = vec![ExtractedSheet {
            href: "/a.css".to_string(),
            critical: CriticalCss {
                css: r#".a::after{content:"</style><script>x()</script>"}.b::after{content:"</STYLE>"}"#
                    .to_string(),
                complete: true,
            },
        }];

        let out = inline_critical(html, &sheets);

        assert_eq!(out.matches("</style>").count(), 1);
        assert!(out.contains(r#"content:"<\/style><script>"#));
        assert!(out.contains(r#"content:"<\/STYLE>""#));
    }

    #[test]
    fn inlines_before_first_link() {
        let sheets = vec![ExtractedSheet {
            href: "/css/app.css".to_string(),
            critical: CriticalCss {
                css: ".hero{color:red}".to_string(),
                complete: false,
            },
        }];

        let html = inline_critical(PAGE, &sheets);

        assert!(html.contains(
            r#"<head><style data-critical>.hero{color:red}</style><link rel="stylesheet" href="/css/app.css">"#
        ));
        assert_eq!(html.matches("<style").count(), 1);
    }

    #[test]
    fn combines_sheets_in_one_style_element() {
        let html = r#"<head><link rel="stylesheet" href="/a.css"><link rel="stylesheet" href="/b.css"></head>"#;
        let sheets = vec![
            ExtractedSheet {
                href: "/a.css".to_string(),
                critical: CriticalCss {
                    css: "a{color:red}".to_string(),
                    complete: false,
                },
            },
            ExtractedSheet {
                href: "/b.css".to_string(),
                critical: CriticalCss {
                    css: "b{color:#00f}".to_string(),
                    complete: true,
                },
            },
        ];

        let out = inline_critical(html, &sheets);

        assert_eq!(
            out,
            r#"<head><style data-critical>a{color:red}b{color:#00f}</style><link rel="stylesheet" href="/a.css"><link rel="stylesheet" href="/b.css"></head>"#
        );
    }

    #[test]
    fn leaves_page_alone_without_critical_css() {
        let sheets = vec![ExtractedSheet {
            href: "/css/app.css".to_string(),
            critical: CriticalCss {
                css: String::new(),
                complete: false,
            },
        }];

        assert_eq!(inline_critical(PAGE, &sheets), PAGE);
    }

    struct FixedRenderer;

    impl FoldRenderer for FixedRenderer {
        fn above_fold(
            &self,
            _page: &Path,
            _html: &str,
            viewport: Viewport,
        ) -> Result<UsageIndex, StyleError> {
            let mut usage = UsageIndex::new();
            usage.classes.insert(format!("w-{}", viewport.width));
            Ok(usage)
        }
    }

    #[test]
    fn merges_every_viewport() {
        let usage = fold_usage(
            &FixedRenderer,
            Path::new("index.html"),
            "",
            &[Viewport::MOBILE, Viewport::DESKTOP],
        )
        .unwrap();

        assert!(usage.has_class("w-375"));
        assert!(usage.has_class("w-1280"));
    }
}
