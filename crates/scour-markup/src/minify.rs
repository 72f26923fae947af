//! Whole-document HTML minification using minify-html.

use minify_html::{minify, Cfg};

use crate::error::MarkupError;

/// Options for HTML minification.
#[derive(Debug, Clone, Copy)]
pub struct MinifyOptions {
    /// Minify `<style>` contents and `style` attributes
    pub minify_css: bool,

    /// Minify `<script>` contents
    pub minify_js: bool,

    /// Keep HTML comments
    pub keep_comments: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            minify_css: true,
            minify_js: true,
            keep_comments: false,
        }
    }
}

/// Minify an HTML document.
///
/// Collapses whitespace, drops comments, optional tags and redundant quotes,
/// and minifies embedded CSS and JavaScript.
pub fn minify_html(html: &str, options: &MinifyOptions) -> Result<String, MarkupError> {
    let cfg = Cfg {
        minify_css: options.minify_css,
        minify_js: options.minify_js,
        keep_comments: options.keep_comments,
        ..Cfg::default()
    };

    let minified = minify(html.as_bytes(), &cfg);
    String::from_utf8(minified).map_err(|e| MarkupError::Encoding(e.to_string()))
}
