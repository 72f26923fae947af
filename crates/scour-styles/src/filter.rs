//! Selector matching against a usage index and rule-list filtering.

use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::selector::{Component, Selector};
use lightningcss::values::ident::Ident;

use crate::usage::{Safelist, UsageIndex};

/// Counts of selectors kept and dropped by a filter pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub removed: usize,
}

/// Decides whether a selector can match any element in a usage index.
pub(crate) struct Matcher<'a> {
    usage: &'a UsageIndex,
    safelist: &'a Safelist,
}

impl<'a> Matcher<'a> {
    pub(crate) fn new(usage: &'a UsageIndex, safelist: &'a Safelist) -> Self {
        Self { usage, safelist }
    }

    /// A selector is kept when every simple selector in it names something used.
    ///
    /// Combinators, pseudo-classes, pseudo-elements, the universal selector and
    /// `:not()` never disqualify a selector.
    pub(crate) fn selector_used(&self, selector: &Selector) -> bool {
        selector
            .iter_raw_match_order()
            .all(|component| self.component_used(component))
    }

    fn component_used(&self, component: &Component) -> bool {
        match component {
            Component::LocalName(local) => {
                let name = ident(&local.lower_name);
                self.usage.has_tag(name) || self.safelist.allows(name)
            }
            Component::Class(class) => {
                let name = ident(class);
                self.usage.has_class(name) || self.safelist.allows(name)
            }
            Component::ID(id) => {
                let name = ident(id);
                self.usage.has_id(name) || self.safelist.allows(name)
            }
            Component::AttributeInNoNamespaceExists { local_name, .. } => {
                self.usage.has_attribute(ident(local_name))
            }
            Component::Is(list) | Component::Where(list) => {
                list.iter().any(|selector| self.selector_used(selector))
            }
            _ => true,
        }
    }
}

fn ident<'a>(ident: &'a Ident<'_>) -> &'a str {
    &ident.0
}

/// Drop unused selectors, then rules and blocks left empty.
pub(crate) fn filter_rules(rules: &mut CssRuleList<'_>, matcher: &Matcher, stats: &mut FilterStats) {
    rules.0.retain_mut(|rule| match rule {
        CssRule::Style(style) => {
            let before = style.selectors.0.len();
            style.selectors.0.retain(|selector| matcher.selector_used(selector));
            let after = style.selectors.0.len();
            stats.kept += after;
            stats.removed += before - after;

            if after == 0 {
                return false;
            }
            filter_rules(&mut style.rules, matcher, stats);
            true
        }
        CssRule::Media(media) => {
            filter_rules(&mut media.rules, matcher, stats);
            !media.rules.0.is_empty()
        }
        CssRule::Supports(supports) => {
            filter_rules(&mut supports.rules, matcher, stats);
            !supports.rules.0.is_empty()
        }
        _ => true,
    });
}
