//! Script removal for HTML documents.

use crate::tag::{rewrite, Edit, StartTag};

/// Options for stripping scripts from a document.
#[derive(Debug, Clone)]
pub struct StripOptions {
    /// Ids of framework hydration-data elements to remove with their content
    pub hydration_ids: Vec<String>,
}

impl Default for StripOptions {
    fn default() -> Self {
        Self {
            hydration_ids: vec!["__NEXT_DATA__".to_string()],
        }
    }
}

/// What was removed from a document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StripStats {
    /// `<script>` elements
    pub scripts: usize,

    /// Script preload links
    pub preloads: usize,

    /// Hydration-data elements
    pub hydration: usize,

    /// Inline event handler attributes
    pub handlers: usize,
}

impl StripStats {
    /// Total number of removals.
    pub fn total(&self) -> usize {
        self.scripts + self.preloads + self.hydration + self.handlers
    }
}

/// Remove scripts, script preloads, hydration data and inline event handlers.
pub fn strip_scripts(html: &str, options: &StripOptions) -> (String, StripStats) {
    let mut stats = StripStats::default();

    let stripped = rewrite(html, |tag, _| {
        if tag.name == "script" {
            stats.scripts += 1;
            return Edit::RemoveElement;
        }

        if is_script_preload(tag) {
            stats.preloads += 1;
            return Edit::RemoveElement;
        }

        if let Some(id) = tag.attr("id") {
            if options.hydration_ids.iter().any(|h| h == id) {
                stats.hydration += 1;
                return Edit::RemoveElement;
            }
        }

        let mut cleaned = tag.clone();
        let removed = cleaned.remove_attrs(|a| is_event_handler(&a.name));
        if removed == 0 {
            return Edit::Keep;
        }
        stats.handlers += removed;
        Edit::Replace(cleaned.to_html())
    });

    (stripped, stats)
}

/// `<link rel="preload" as="script">`, `<link rel="modulepreload">` and friends.
fn is_script_preload(tag: &StartTag) -> bool {
    if tag.name != "link" {
        return false;
    }
    if tag.attr_has_token("rel", "modulepreload") {
        return true;
    }
    let preloading = tag.attr_has_token("rel", "preload") || tag.attr_has_token("rel", "prefetch");
    preloading
        && tag
            .attr("as")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("script"))
}

/// Attribute names like `onclick`, `onload`, `onmouseover`.
fn is_event_handler(name: &str) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..].chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NEXT_PAGE: &str = r#"<!DOCTYPE html><html lang="en"><head><meta charSet="utf-8"/><link rel="preload" as="script" href="/_next/static/chunks/webpack.js"/><link rel="modulepreload" href="/_next/static/chunks/main.mjs"/><link rel="stylesheet" href="/_next/static/css/app.css"/><script src="/_next/static/chunks/polyfills.js" noModule=""></script></head><body><div id="__next"><button class="btn" onclick="go()" onMouseOver="hover()">Go</button></div><script id="__NEXT_DATA__" type="application/json">{"props":{"page":"<div>"}}</script><script>self.__next_f.push([1,"</p>"])</script></body></html>"#;

    #[test]
    fn removes_all_script_markup() {
        let (html, stats) = strip_scripts(NEXT_PAGE, &StripOptions::default());

        assert!(!html.contains("<script"));
        assert!(!html.contains("modulepreload"));
        assert!(!html.contains(r#"as="script""#));
        assert!(!html.contains("onclick"));
        assert!(!html.to_ascii_lowercase().contains("onmouseover"));
        assert!(!html.contains("__NEXT_DATA__"));
        assert_eq!(stats.scripts, 3);
        assert_eq!(stats.preloads, 2);
        assert_eq!(stats.handlers, 2);
    }

    #[test]
    fn keeps_stylesheets_and_content() {
        let (html, _) = strip_scripts(NEXT_PAGE, &StripOptions::default());

        assert!(html.contains(r#"<link rel="stylesheet" href="/_next/static/css/app.css"/>"#));
        assert!(html.contains(r#"<button class="btn">Go</button>"#));
        assert!(html.ends_with("</div></body></html>"));
    }

    #[test]
    fn removes_handlers_glued_to_previous_attribute() {
        let html = r#"<a href="/x"onclick="evil()">go</a>"#;

        let (out, stats) = strip_scripts(html, &StripOptions::default());

        assert_eq!(out, r#"<a href="/x">go</a>"#);
        assert_eq!(stats.handlers, 1);
    }

    #[test]
    fn removes_non_script_hydration_elements() {
        let html = r#"<body><div id="app-state"><span>data</span></div><p>kept</p></body>"#;
        let options = StripOptions {
            hydration_ids: vec!["app-state".to_string()],
        };

        let (out, stats) = strip_scripts(html, &options);

        assert_eq!(out, "<body><p>kept</p></body>");
        assert_eq!(stats.hydration, 1);
    }

    #[test]
    fn leaves_script_free_documents_untouched() {
        let html = "<html><body><p data-on=\"1\">Hello</p></body></html>";
        let (out, stats) = strip_scripts(html, &StripOptions::default());

        assert_eq!(out, html);
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn recognizes_event_handler_names() {
        assert!(is_event_handler("onclick"));
        assert!(is_event_handler("onload"));
        assert!(!is_event_handler("on"));
        assert!(!is_event_handler("one-time"));
    }
}
