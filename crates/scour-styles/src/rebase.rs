//! Rewriting relative `url()` references when CSS moves to another document.

use std::convert::Infallible;

use lightningcss::stylesheet::StyleSheet;
use lightningcss::values::url::Url;
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};

/// Makes every relative `url()` root-relative to the directory the
/// stylesheet was served from.
struct UrlRebase<'a> {
    base: &'a str,
}

impl<'i> Visitor<'i> for UrlRebase<'_> {
    type Error = Infallible;

    fn visit_types(&self) -> VisitTypes {
        visit_types!(URLS)
    }

    fn visit_url(&mut self, url: &mut Url<'i>) -> Result<(), Self::Error> {
        if let Some(rebased) = rebase_url(&url.url, self.base) {
            url.url = rebased.into();
        }
        Ok(())
    }
}

/// Rebase the relative URLs of a parsed stylesheet onto `base`, a
/// root-relative directory such as `/css/`.
pub(crate) fn rebase_urls(stylesheet: &mut StyleSheet, base: &str) {
    let mut visitor = UrlRebase { base };
    if let Err(never) = stylesheet.visit(&mut visitor) {
        match never {}
    }
}

/// Resolve `url` against `base`. Returns `None` for URLs that do not depend
/// on where the stylesheet lives.
pub(crate) fn rebase_url(url: &str, base: &str) -> Option<String> {
    if url.is_empty() || url.starts_with(['/', '#']) || has_scheme(url) {
        return None;
    }

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for part in url.split('/') {
        match part {
            "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(part),
        }
    }

    Some(format!("/{}", segments.join("/")))
}

fn has_scheme(url: &str) -> bool {
    url.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
