//! Non-blocking stylesheet loading.

use scour_markup::{rewrite, Edit, StartTag};

use crate::critical::is_managed_stylesheet;

/// Script that swaps a deferred stylesheet to all media once it has loaded.
pub const SWAP_ON_LOAD: &str = "this.media='all'";

/// Make every managed stylesheet link load without blocking render.
///
/// Each link is switched to `media="print"` with an `onload` swap to all
/// media, and followed by a `<noscript>` link to the same `href` for clients
/// without scripting. Links that are already deferred are left alone.
/// Returns the rewritten document and the number of links changed.
pub fn defer_stylesheets(html: &str) -> (String, usize) {
    let mut deferred = 0;

    let out = rewrite(html, |tag, ancestors| {
        if !is_managed_stylesheet(tag, ancestors) || is_deferred(tag) {
            return Edit::Keep;
        }
        let Some(href) = tag.attr("href") else {
            return Edit::Keep;
        };

        let mut fallback = StartTag::new("link");
        fallback.set_attr("rel", "stylesheet");
        fallback.set_attr("href", href);

        let mut link = tag.clone();
        link.set_attr("media", "print");
        link.set_attr("onload", SWAP_ON_LOAD);

        deferred += 1;
        Edit::Replace(format!(
            "{}<noscript>{}</noscript>",
            link.to_html(),
            fallback.to_html()
        ))
    });

    (out, deferred)
}

fn is_deferred(tag: &StartTag) -> bool {
    tag.attr("media") == Some("print") && tag.has_attr("onload")
}
