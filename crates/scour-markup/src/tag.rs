//! Tag-level HTML scanner and rewriter.
//!
//! Finds start and end tags in an HTML string without building a tree, so a
//! document can be edited in place while every byte outside the touched tags
//! is preserved. Comments and the bodies of raw-text elements (`script`,
//! `style`, `textarea`, `title`) are skipped, so markup that only appears
//! inside them is never reported.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Elements that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is raw text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// A single attribute on a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercase attribute name
    pub name: String,

    /// Raw value without quotes; `None` for bare attributes like `defer`
    pub value: Option<String>,
}

/// A parsed start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercase element name
    pub name: String,

    /// Attributes in source order
    pub attrs: Vec<Attribute>,

    /// Whether the tag ended with `/>`
    pub self_closing: bool,
}

impl StartTag {
    /// Create an empty start tag.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    /// Get an attribute value. Bare attributes yield an empty string.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    /// Whether the attribute is present.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = Some(value.to_string()),
            None => self.attrs.push(Attribute {
                name,
                value: Some(value.to_string()),
            }),
        }
    }

    /// Remove every attribute matching the predicate. Returns how many were removed.
    pub fn remove_attrs<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Attribute) -> bool,
    {
        let before = self.attrs.len();
        self.attrs.retain(|a| !predicate(a));
        before - self.attrs.len()
    }

    /// Whether a whitespace-separated token list attribute (e.g. `rel`) contains `token`.
    pub fn attr_has_token(&self, name: &str, token: &str) -> bool {
        self.attr(name)
            .map(|v| v.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    /// Whether this is a `<link>` to a stylesheet.
    pub fn is_stylesheet_link(&self) -> bool {
        self.name == "link" && self.attr_has_token("rel", "stylesheet")
    }

    /// Whether the element has no end tag.
    pub fn is_void(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.contains(&self.name.as_str())
    }

    /// Serialize the tag back to HTML.
    pub fn to_html(&self) -> String {
        let mut html = format!("<{}", self.name);
        for attr in &self.attrs {
            html.push(' ');
            html.push_str(&attr.name);
            if let Some(value) = &attr.value {
                html.push_str("=\"");
                html.push_str(&value.replace('"', "&quot;"));
                html.push('"');
            }
        }
        if self.self_closing {
            html.push_str(" />");
        } else {
            html.push('>');
        }
        html
    }
}

/// What a located tag is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A start tag
    Start(StartTag),
    /// An end tag, with its lowercase element name
    End(String),
}

/// A tag and the byte range it occupies in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub span: Range<usize>,
    pub kind: TokenKind,
}

/// Edit to apply to a start tag during [`rewrite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Leave the tag untouched
    Keep,
    /// Replace the start tag with the given markup
    Replace(String),
    /// Insert markup immediately before the start tag
    InsertBefore(String),
    /// Remove the element together with its content and end tag
    RemoveElement,
}

/// A start tag, end tag, or the opening of a comment. The first attribute
/// must be separated from the name by whitespace. Later ones may follow a
/// quoted value directly, as browsers allow.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<!--|<(/?)([a-zA-Z][a-zA-Z0-9:-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?(?:\s*[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)?)\s*(/?)>"#,
    )
    .expect("Invalid tag regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("Invalid attribute regex")
});

/// Scan an HTML string for tags.
pub fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(caps) = TAG_RE.captures_at(html, pos) {
        let Some(whole) = caps.get(0) else { break };

        if whole.as_str() == "<!--" {
            pos = match html[whole.end()..].find("-->") {
                Some(i) => whole.end() + i + 3,
                None => html.len(),
            };
            continue;
        }

        let is_end = caps.get(1).is_some_and(|m| !m.is_empty());
        let name = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        pos = whole.end();

        if is_end {
            tokens.push(Token {
                span: whole.range(),
                kind: TokenKind::End(name),
            });
            continue;
        }

        let tag = StartTag {
            attrs: parse_attrs(caps.get(3).map(|m| m.as_str()).unwrap_or("")),
            self_closing: caps.get(4).is_some_and(|m| !m.is_empty()),
            name,
        };

        // Jump over raw text so its contents are never mistaken for tags
        if !tag.self_closing && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
            let close = format!("</{}", tag.name);
            pos = html[pos..]
                .to_ascii_lowercase()
                .find(&close)
                .map(|i| pos + i)
                .unwrap_or(html.len());
        }

        tokens.push(Token {
            span: whole.range(),
            kind: TokenKind::Start(tag),
        });
    }

    tokens
}

/// Parse the attribute section of a start tag.
fn parse_attrs(source: &str) -> Vec<Attribute> {
    ATTR_RE
        .captures_iter(source)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            Some(Attribute { name, value })
        })
        .collect()
}

/// Visit every start tag along with the names of its open ancestors.
pub fn visit<F>(html: &str, mut visitor: F)
where
    F: FnMut(&StartTag, &[String]),
{
    let mut stack: Vec<String> = Vec::new();
    for token in tokenize(html) {
        match &token.kind {
            TokenKind::Start(tag) => {
                visitor(tag, &stack);
                open(&mut stack, tag);
            }
            TokenKind::End(name) => close(&mut stack, name),
        }
    }
}

/// Rewrite start tags in an HTML string.
///
/// The callback receives each start tag and its open ancestors (outermost
/// first). Tags inside an element removed with [`Edit::RemoveElement`] are
/// not offered.
pub fn rewrite<F>(html: &str, mut edit: F) -> String
where
    F: FnMut(&StartTag, &[String]) -> Edit,
{
    let tokens = tokenize(html);
    let mut out = String::with_capacity(html.len());
    let mut stack: Vec<String> = Vec::new();
    let mut cursor = 0;
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        i += 1;

        let tag = match &token.kind {
            TokenKind::Start(tag) => tag,
            TokenKind::End(name) => {
                close(&mut stack, name);
                continue;
            }
        };

        match edit(tag, &stack) {
            Edit::Keep => open(&mut stack, tag),
            Edit::Replace(markup) => {
                out.push_str(&html[cursor..token.span.start]);
                out.push_str(&markup);
                cursor = token.span.end;
                open(&mut stack, tag);
            }
            Edit::InsertBefore(markup) => {
                out.push_str(&html[cursor..token.span.start]);
                out.push_str(&markup);
                cursor = token.span.start;
                open(&mut stack, tag);
            }
            Edit::RemoveElement => {
                out.push_str(&html[cursor..token.span.start]);
                cursor = token.span.end;
                if let Some(end) = matching_end(&tokens, i - 1) {
                    cursor = tokens[end].span.end;
                    i = end + 1;
                }
            }
        }
    }

    out.push_str(&html[cursor..]);
    out
}

/// Index of the end tag closing the start tag at `start`.
fn matching_end(tokens: &[Token], start: usize) -> Option<usize> {
    let TokenKind::Start(tag) = &tokens[start].kind else {
        return None;
    };
    if tag.is_void() {
        return None;
    }

    let mut depth = 1usize;
    for (offset, token) in tokens[start + 1..].iter().enumerate() {
        match &token.kind {
            TokenKind::Start(inner) if inner.name == tag.name && !inner.is_void() => depth += 1,
            TokenKind::End(name) if *name == tag.name => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + 1 + offset);
                }
            }
            _ => {}
        }
    }

    None
}

fn open(stack: &mut Vec<String>, tag: &StartTag) {
    if !tag.is_void() {
        stack.push(tag.name.clone());
    }
}

fn close(stack: &mut Vec<String>, name: &str) {
    if let Some(pos) = stack.iter().rposition(|n| n == name) {
        stack.truncate(pos);
    }
}
