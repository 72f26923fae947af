//! Unused-rule removal and minification using lightningcss.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use crate::error::StyleError;
use crate::filter::{filter_rules, FilterStats, Matcher};
use crate::rebase::rebase_urls;
use crate::usage::{Safelist, UsageIndex};

/// Result of purging a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedCss {
    /// Minified CSS containing only used rules
    pub css: String,

    /// Selectors kept and removed
    pub stats: FilterStats,
}

/// Remove every rule whose selectors match nothing in `usage`, then minify.
pub fn purge_css(
    source: &str,
    filename: &str,
    usage: &UsageIndex,
    safelist: &Safelist,
) -> Result<PurgedCss, StyleError> {
    let matcher = Matcher::new(usage, safelist);
    filter_and_minify(source, filename, &matcher, None)
}

/// Minify CSS without removing anything.
pub fn minify_css(source: &str, filename: &str) -> Result<String, StyleError> {
    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };
    let mut stylesheet = StyleSheet::parse(source, options).map_err(|e| parse_error(filename, e))?;
    finish(&mut stylesheet, filename)
}

/// Filter rules with `matcher` and minify what is left.
///
/// With a `url_base`, relative URLs are rewritten to be root-relative to it.
pub(crate) fn filter_and_minify(
    source: &str,
    filename: &str,
    matcher: &Matcher,
    url_base: Option<&str>,
) -> Result<PurgedCss, StyleError> {
    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };
    let mut stylesheet = StyleSheet::parse(source, options).map_err(|e| parse_error(filename, e))?;

    let mut stats = FilterStats::default();
    filter_rules(&mut stylesheet.rules, matcher, &mut stats);

    if let Some(base) = url_base {
        rebase_urls(&mut stylesheet, base);
    }

    let css = finish(&mut stylesheet, filename)?;
    Ok(PurgedCss { css, stats })
}

fn parse_error(filename: &str, e: impl std::fmt::Display) -> StyleError {
    StyleError::ParseError {
        file: filename.to_string(),
        message: e.to_string(),
    }
}

fn finish(stylesheet: &mut StyleSheet, filename: &str) -> Result<String, StyleError> {
    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| StyleError::MinifyError {
            file: filename.to_string(),
            message: e.to_string(),
        })?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| StyleError::PrintError {
            file: filename.to_string(),
            message: e.to_string(),
        })?;

    Ok(printed.code)
}
