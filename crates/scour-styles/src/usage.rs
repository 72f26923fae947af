//! Index of the names a set of HTML documents actually uses.

use std::collections::{BTreeSet, HashSet};

use regex::RegexSet;
use scour_markup::{visit, StartTag};
use serde::Deserialize;

use crate::error::StyleError;

/// Tag names, classes, ids and attribute names seen in HTML documents.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UsageIndex {
    /// Lowercase element names
    pub tags: BTreeSet<String>,

    /// Class names (case-sensitive)
    pub classes: BTreeSet<String>,

    /// Element ids (case-sensitive)
    pub ids: BTreeSet<String>,

    /// Lowercase attribute names
    pub attributes: BTreeSet<String>,
}

impl UsageIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a single document.
    pub fn from_html(html: &str) -> Self {
        let mut index = Self::new();
        index.scan_html(html);
        index
    }

    /// Add every element of a document to the index.
    pub fn scan_html(&mut self, html: &str) {
        visit(html, |tag, _| self.record_tag(tag));
    }

    /// Add a single element.
    pub fn record_tag(&mut self, tag: &StartTag) {
        self.tags.insert(tag.name.clone());

        if let Some(class) = tag.attr("class") {
            for name in class.split_ascii_whitespace() {
                self.classes.insert(name.to_string());
            }
        }
        if let Some(id) = tag.attr("id").map(str::trim).filter(|id| !id.is_empty()) {
            self.ids.insert(id.to_string());
        }
        for attr in &tag.attrs {
            self.attributes.insert(attr.name.clone());
        }
    }

    /// Merge another index into this one.
    pub fn merge(&mut self, other: &UsageIndex) {
        self.tags.extend(other.tags.iter().cloned());
        self.classes.extend(other.classes.iter().cloned());
        self.ids.extend(other.ids.iter().cloned());
        self.attributes.extend(other.attributes.iter().cloned());
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains(&name.to_ascii_lowercase())
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    pub fn has_id(&self, name: &str) -> bool {
        self.ids.contains(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(&name.to_ascii_lowercase())
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.classes.is_empty()
            && self.ids.is_empty()
            && self.attributes.is_empty()
    }
}

/// Names that are always treated as used, whether or not any document has them.
#[derive(Debug, Clone)]
pub struct Safelist {
    names: HashSet<String>,
    patterns: RegexSet,
}

impl Safelist {
    /// Create a safelist from literal names and regex patterns.
    ///
    /// A name matches tags, classes and ids alike.
    pub fn new<I, S>(names: I, patterns: &[String]) -> Result<Self, StyleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            names: names.into_iter().map(Into::into).collect(),
            patterns: RegexSet::new(patterns)?,
        })
    }

    /// Whether a name is always kept.
    pub fn allows(&self, name: &str) -> bool {
        self.names.contains(name) || self.patterns.is_match(name)
    }
}

impl Default for Safelist {
    fn default() -> Self {
        Self {
            names: ["html", "body"].into_iter().map(String::from).collect(),
            patterns: RegexSet::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_elements() {
        let index = UsageIndex::from_html(
            r#"<html><body><main id="top" class="max-w-3xl  mx-auto hover:text-stone-900"><a href="/" data-kind="x">Home</a></main></body></html>"#,
        );

        assert!(index.has_tag("main"));
        assert!(index.has_tag("A"));
        assert!(index.has_class("max-w-3xl"));
        assert!(index.has_class("hover:text-stone-900"));
        assert!(index.has_id("top"));
        assert!(index.has_attribute("data-kind"));
        assert!(!index.has_tag("footer"));
        assert!(!index.has_class("mx"));
    }

    #[test]
    fn merges_indexes() {
        let mut a = UsageIndex::from_html(r#"<p class="one"></p>"#);
        let b = UsageIndex::from_html(r#"<span class="two"></span>"#);
        a.merge(&b);

        assert!(a.has_class("one"));
        assert!(a.has_class("two"));
        assert!(a.has_tag("span"));
    }

    #[test]
    fn reads_class_and_id_after_boolean_attributes() {
        let index = UsageIndex::from_html(
            r#"<button disabled class="btn">x</button><details open id="faq"><summary>Q</summary></details>"#,
        );

        assert!(index.has_class("btn"));
        assert!(index.has_id("faq"));
        assert!(index.has_attribute("disabled"));
        assert!(index.has_attribute("open"));
        assert!(index.has_attribute("class"));
        assert!(!index.has_attribute("lass"));
    }

    #[test]
    fn ignores_markup_in_comments_and_scripts() {
        let index = UsageIndex::from_html(
            r#"<!-- <p class="old"> --><script>el.innerHTML = '<div class="js-only">'</script><p class="live"></p>"#,
        );

        assert!(index.has_class("live"));
        assert!(!index.has_class("old"));
        assert!(!index.has_class("js-only"));
    }

    #[test]
    fn safelist_matches_names_and_patterns() {
        let safelist = Safelist::new(["html", "body"], &["^prose-".to_string()]).unwrap();

        assert!(safelist.allows("body"));
        assert!(safelist.allows("prose-lg"));
        assert!(!safelist.allows("main"));
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(Safelist::new(Vec::<String>::new(), &["(".to_string()]).is_err());
    }
}
