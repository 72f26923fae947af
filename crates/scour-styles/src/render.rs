//! Finding the elements that are visible without scrolling.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scour_markup::{tokenize, StartTag, TokenKind};
use serde::Deserialize;

use crate::error::StyleError;
use crate::usage::UsageIndex;

/// A viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const MOBILE: Viewport = Viewport {
        width: 375,
        height: 667,
    };

    pub const DESKTOP: Viewport = Viewport {
        width: 1280,
        height: 800,
    };
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Viewports every page is rendered at.
pub const DEFAULT_VIEWPORTS: [Viewport; 2] = [Viewport::MOBILE, Viewport::DESKTOP];

/// Reports which elements of a page are above the fold at a viewport size.
pub trait FoldRenderer {
    /// Renderer identifier (e.g., "flow", "chrome")
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Usage index of the elements whose top edge is inside the viewport.
    ///
    /// # Arguments
    /// * `page` - Path of the HTML file on disk
    /// * `html` - Contents of that file
    /// * `viewport` - Viewport to lay the page out in
    fn above_fold(&self, page: &Path, html: &str, viewport: Viewport)
        -> Result<UsageIndex, StyleError>;
}

/// Which renderer to use for critical CSS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Static layout estimate, no browser needed
    #[default]
    Flow,
    /// Headless Chrome
    Chrome,
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererKind::Flow => f.write_str("flow"),
            RendererKind::Chrome => f.write_str("chrome"),
        }
    }
}

/// Create the renderer for a kind.
///
/// `root` is the site root that pages are rendered from, so root-relative
/// URLs inside a page resolve. Fails for `chrome` when the crate was built
/// without the `chrome` feature.
pub fn create_renderer(
    kind: RendererKind,
    timeout: Duration,
    root: &Path,
) -> Result<Box<dyn FoldRenderer>, StyleError> {
    match kind {
        RendererKind::Flow => Ok(Box::new(FlowRenderer::new())),
        #[cfg(feature = "chrome")]
        RendererKind::Chrome => Ok(Box::new(chrome::ChromeRenderer::new(timeout, root)?)),
        #[cfg(not(feature = "chrome"))]
        RendererKind::Chrome => {
            let _ = (timeout, root);
            Err(StyleError::RendererUnavailable(kind.to_string()))
        }
    }
}

/// Subtrees that never take up space on screen.
const HIDDEN_ELEMENTS: &[&str] = &[
    "head", "script", "style", "template", "noscript", "title", "meta", "link",
];

/// Elements that start on a new line and carry vertical margins.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Horizontal space lost to page padding.
const GUTTER: f32 = 32.0;

/// Average glyph width relative to the font size.
const GLYPH_RATIO: f32 = 0.5;

/// Estimates layout from markup alone.
///
/// Walks the document in order, stacking text lines (wrapped to the viewport
/// width), block margins and replaced elements vertically. Every element that
/// starts before the running height passes the viewport height counts as
/// above the fold.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowRenderer;

impl FlowRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl FoldRenderer for FlowRenderer {
    fn name(&self) -> &'static str {
        "flow"
    }

    fn above_fold(
        &self,
        _page: &Path,
        html: &str,
        viewport: Viewport,
    ) -> Result<UsageIndex, StyleError> {
        Ok(FlowLayout::new(viewport).run(html))
    }
}

/// Comments and `<!DOCTYPE>`-style declarations between tags.
static DECLARATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<![^>]*>").expect("Invalid declaration regex"));

/// An element that is open during layout.
struct Frame {
    name: String,

    /// Margin added again when the element closes
    spacing: f32,

    /// Line height of the text inside it
    line: f32,

    /// Content takes no space of its own
    skip: bool,
}

struct FlowLayout {
    viewport: Viewport,
    y: f32,
    stack: Vec<Frame>,
    usage: UsageIndex,
}

impl FlowLayout {
    fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            y: 0.0,
            stack: Vec::new(),
            usage: UsageIndex::new(),
        }
    }

    fn run(mut self, html: &str) -> UsageIndex {
        let mut cursor = 0;
        for token in tokenize(html) {
            self.text(&html[cursor..token.span.start]);
            cursor = token.span.end;
            if self.below_fold() {
                return self.usage;
            }

            match &token.kind {
                TokenKind::Start(tag) => self.open(tag),
                TokenKind::End(name) => self.close(name),
            }
        }
        self.usage
    }

    fn below_fold(&self) -> bool {
        self.y >= self.viewport.height as f32
    }

    fn skipping(&self) -> bool {
        self.stack.iter().any(|frame| frame.skip)
    }

    fn line(&self) -> f32 {
        self.stack
            .last()
            .map(|frame| frame.line)
            .unwrap_or_else(|| line_height("body"))
    }

    fn open(&mut self, tag: &StartTag) {
        let void = tag.is_void();
        let hidden = tag.has_attr("hidden") || HIDDEN_ELEMENTS.contains(&tag.name.as_str());
        if self.skipping() || hidden {
            self.push_skipped(tag);
            return;
        }

        self.usage.record_tag(tag);

        if let Some(height) = replaced_height(tag) {
            self.y += height;
            self.push_skipped(tag);
            return;
        }

        let block = BLOCK_ELEMENTS.contains(&tag.name.as_str());
        let spacing = if block { margin(&tag.name) } else { 0.0 };
        self.y += spacing;
        if void {
            self.y += spacing;
            return;
        }

        let line = if block { line_height(&tag.name) } else { self.line() };
        self.stack.push(Frame {
            name: tag.name.clone(),
            spacing,
            line,
            skip: false,
        });
    }

    /// Open an element whose content is not laid out.
    fn push_skipped(&mut self, tag: &StartTag) {
        if tag.is_void() {
            return;
        }
        let line = self.line();
        self.stack.push(Frame {
            name: tag.name.clone(),
            spacing: 0.0,
            line,
            skip: true,
        });
    }

    /// Close an element and every element left open inside it.
    fn close(&mut self, name: &str) {
        let Some(pos) = self.stack.iter().rposition(|frame| frame.name == name) else {
            return;
        };
        let closed: Vec<Frame> = self.stack.drain(pos..).collect();
        self.y += closed.iter().map(|frame| frame.spacing).sum::<f32>();
    }

    fn text(&mut self, raw: &str) {
        if self.skipping() {
            return;
        }
        let text = DECLARATION_RE.replace_all(raw, "");
        let chars: usize = text
            .split_whitespace()
            .map(|word| word.chars().count() + 1)
            .sum();
        if chars == 0 {
            return;
        }

        let line = self.line();
        let glyph = line / 1.5 * GLYPH_RATIO;
        let per_line = ((self.viewport.width as f32 - GUTTER) / glyph).max(1.0);
        self.y += (chars as f32 / per_line).ceil() * line;
    }
}

fn line_height(name: &str) -> f32 {
    match name {
        "h1" => 48.0,
        "h2" => 36.0,
        "h3" => 30.0,
        "h4" => 26.0,
        "figcaption" | "small" => 20.0,
        _ => 24.0,
    }
}

fn margin(name: &str) -> f32 {
    match name {
        "h1" | "h2" => 24.0,
        "h3" | "h4" | "h5" | "h6" | "p" | "ul" | "ol" | "pre" | "blockquote" | "figure" => 16.0,
        "li" | "dt" | "dd" | "tr" => 4.0,
        _ => 0.0,
    }
}

/// Height of elements whose size does not come from their children.
fn replaced_height(tag: &StartTag) -> Option<f32> {
    let fallback = match tag.name.as_str() {
        "img" => 200.0,
        "video" => 225.0,
        "iframe" | "canvas" | "object" | "embed" => 150.0,
        "svg" => 24.0,
        _ => return None,
    };

    let declared = tag
        .attr("height")
        .and_then(|h| h.trim().trim_end_matches("px").parse::<f32>().ok());

    Some(declared.unwrap_or(fallback))
}

#[cfg(feature = "chrome")]
mod chrome {
    use std::cell::RefCell;
    use std::collections::hash_map::Entry;
    use std::collections::HashMap;
    use std::net::TcpListener;
    use std::path::{Path, PathBuf};
    use std::thread;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use axum::Router;
    use headless_chrome::{Browser, LaunchOptions};
    use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
    use tokio::sync::oneshot;
    use tower_http::services::ServeDir;

    use super::{FoldRenderer, Viewport};
    use crate::error::StyleError;
    use crate::usage::UsageIndex;

    /// Collects the names used by elements whose box starts above the fold.
    const FOLD_SCRIPT: &str = r#"(function() {
        const out = { tags: [], classes: [], ids: [], attributes: [] };
        const fold = window.innerHeight;
        for (const el of document.querySelectorAll('*')) {
            const rect = el.getBoundingClientRect();
            if (rect.top + window.scrollY >= fold) continue;
            out.tags.push(el.localName);
            for (const c of el.classList) out.classes.push(c);
            if (el.id) out.ids.push(el.id);
            for (const a of el.getAttributeNames()) out.attributes.push(a);
        }
        return JSON.stringify(out);
    })()"#;

    /// Characters escaped in URL path segments.
    const SEGMENT: &AsciiSet = &CONTROLS
        .add(b' ')
        .add(b'"')
        .add(b'#')
        .add(b'%')
        .add(b'<')
        .add(b'>')
        .add(b'?')
        .add(b'`')
        .add(b'{')
        .add(b'}');

    /// Serves the site root over HTTP on a loopback port until dropped.
    struct SiteServer {
        port: u16,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl SiteServer {
        fn start(root: &Path) -> std::io::Result<Self> {
            let listener = TcpListener::bind("127.0.0.1:0")?;
            listener.set_nonblocking(true)?;
            let port = listener.local_addr()?.port();

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let app = Router::new().fallback_service(ServeDir::new(root));
            let (tx, rx) = oneshot::channel::<()>();

            thread::spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(e) => {
                            tracing::error!("Render server failed to start: {}", e);
                            return;
                        }
                    };
                    let server = axum::serve(listener, app).with_graceful_shutdown(async {
                        let _ = rx.await;
                    });
                    if let Err(e) = server.await {
                        tracing::error!("Render server stopped: {}", e);
                    }
                });
            });

            tracing::debug!("Serving {} on port {} for rendering", root.display(), port);
            Ok(Self {
                port,
                shutdown: Some(tx),
            })
        }
    }

    impl Drop for SiteServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    /// The URL a page is served at, or `None` when it lies outside `root`.
    pub(super) fn page_url(port: u16, root: &Path, page: &Path) -> Option<String> {
        let relative = page.strip_prefix(root).ok()?;
        let path: Vec<String> = relative
            .components()
            .map(|c| utf8_percent_encode(&c.as_os_str().to_string_lossy(), SEGMENT).to_string())
            .collect();
        Some(format!("http://127.0.0.1:{}/{}", port, path.join("/")))
    }

    /// Renders pages in headless Chrome, one browser per viewport size.
    ///
    /// Pages are loaded from a local server over the site root. Browsers are
    /// launched on first use and reused for every later page.
    pub struct ChromeRenderer {
        timeout: Duration,
        root: PathBuf,
        server: SiteServer,
        browsers: RefCell<HashMap<Viewport, Browser>>,
    }

    impl ChromeRenderer {
        pub fn new(timeout: Duration, root: &Path) -> std::result::Result<Self, StyleError> {
            let serve_error = |source| StyleError::ServeError {
                root: root.display().to_string(),
                source,
            };
            let root = root.canonicalize().map_err(serve_error)?;
            let server = SiteServer::start(&root).map_err(serve_error)?;

            Ok(Self {
                timeout,
                root,
                server,
                browsers: RefCell::new(HashMap::new()),
            })
        }

        fn render(&self, page: &Path, viewport: Viewport) -> Result<String> {
            let page = page.canonicalize()?;
            let url = page_url(self.server.port, &self.root, &page)
                .ok_or_else(|| anyhow!("page is outside {}", self.root.display()))?;

            let mut browsers = self.browsers.borrow_mut();
            let browser = match browsers.entry(viewport) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(Browser::new(LaunchOptions {
                    window_size: Some((viewport.width, viewport.height)),
                    ..Default::default()
                })?),
            };

            let tab = browser.new_tab()?;
            tab.set_default_timeout(self.timeout);
            tab.navigate_to(&url)?.wait_until_navigated()?;

            let value = tab.evaluate(FOLD_SCRIPT, false)?.value;
            if let Err(e) = tab.close(true) {
                tracing::debug!("Could not close tab for {}: {}", url, e);
            }

            value
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| anyhow!("fold script returned no value"))
        }
    }

    impl FoldRenderer for ChromeRenderer {
        fn name(&self) -> &'static str {
            "chrome"
        }

        fn above_fold(
            &self,
            page: &Path,
            _html: &str,
            viewport: Viewport,
        ) -> std::result::Result<UsageIndex, StyleError> {
            let render_error = |message: String| StyleError::RenderError {
                page: page.display().to_string(),
                message,
            };

            let json = self
                .render(page, viewport)
                .map_err(|e| render_error(e.to_string()))?;
            serde_json::from_str(&json).map_err(|e| render_error(e.to_string()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn pages_are_served_from_the_site_root() {
            let root = Path::new("/site/out");

            assert_eq!(
                page_url(4000, root, Path::new("/site/out/index.html")).as_deref(),
                Some("http://127.0.0.1:4000/index.html")
            );
            assert_eq!(
                page_url(4000, root, Path::new("/site/out/blog/my post.html")).as_deref(),
                Some("http://127.0.0.1:4000/blog/my%20post.html")
            );
            assert_eq!(page_url(4000, root, Path::new("/elsewhere/a.html")), None);
        }

        #[test]
        fn server_serves_root_relative_assets() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("css")).unwrap();
            std::fs::write(dir.path().join("css/app.css"), ".a{color:red}").unwrap();

            let server = SiteServer::start(dir.path()).unwrap();
            let mut stream = None;
            for _ in 0..50 {
                match std::net::TcpStream::connect(("127.0.0.1", server.port)) {
                    Ok(s) => {
                        stream = Some(s);
                        break;
                    }
                    Err(_) => thread::sleep(Duration::from_millis(20)),
                }
            }
            let mut stream = stream.unwrap();

            use std::io::{Read, Write};
            stream
                .write_all(b"GET /css/app.css HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();

            assert!(response.starts_with("HTTP/1.1 200"));
            assert!(response.ends_with(".a{color:red}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(count: usize) -> String {
        let body: String = (0..count)
            .map(|i| format!(r#"<p class="para-{i}">{}</p>"#, "lorem ipsum dolor sit amet ".repeat(8)))
            .collect();
        format!(
            r#"<!DOCTYPE html><html><head><title>t</title><link rel="stylesheet" href="/a.css"></head><body><header class="hero"><h1>Title</h1></header><main>{body}</main><footer class="site-footer">f</footer></body></html>"#
        )
    }

    #[test]
    fn records_top_of_page() {
        let usage = FlowRenderer
            .above_fold(Path::new("index.html"), &paragraphs(40), Viewport::DESKTOP)
            .unwrap();

        assert!(usage.has_tag("html"));
        assert!(usage.has_tag("body"));
        assert!(usage.has_class("hero"));
        assert!(usage.has_tag("h1"));
        assert!(usage.has_class("para-0"));
        assert!(!usage.has_class("site-footer"));
        assert!(!usage.has_tag("link"));
    }

    #[test]
    fn narrow_viewports_fit_less() {
        let html = paragraphs(40);
        let page = Path::new("index.html");
        let mobile = FlowRenderer.above_fold(page, &html, Viewport::MOBILE).unwrap();
        let desktop = FlowRenderer.above_fold(page, &html, Viewport::DESKTOP).unwrap();

        assert!(mobile.classes.len() < desktop.classes.len());
    }

    #[test]
    fn short_pages_are_fully_visible() {
        let usage = FlowRenderer
            .above_fold(Path::new("index.html"), &paragraphs(1), Viewport::DESKTOP)
            .unwrap();

        assert!(usage.has_class("site-footer"));
    }

    #[test]
    fn images_use_declared_height() {
        let html = r#"<body><img class="banner" src="a.png" height="2000"><p class="below">x</p></body>"#;
        let usage = FlowRenderer
            .above_fold(Path::new("index.html"), html, Viewport::DESKTOP)
            .unwrap();

        assert!(usage.has_class("banner"));
        assert!(!usage.has_class("below"));
    }

    #[test]
    fn records_classes_after_boolean_attributes() {
        let html = r#"<body><button disabled class="cta">Go</button><details open id="faq"><summary>Q</summary></details></body>"#;
        let usage = FlowRenderer
            .above_fold(Path::new("index.html"), html, Viewport::MOBILE)
            .unwrap();

        assert!(usage.has_class("cta"));
        assert!(usage.has_id("faq"));
    }

    #[test]
    fn skips_hidden_subtrees() {
        let html = r#"<body><div hidden><p class="secret">x</p></div><template><p class="tpl"></p></template><p class="shown">y</p></body>"#;
        let usage = FlowRenderer
            .above_fold(Path::new("index.html"), html, Viewport::DESKTOP)
            .unwrap();

        assert!(usage.has_class("shown"));
        assert!(!usage.has_class("secret"));
        assert!(!usage.has_class("tpl"));
    }

    #[test]
    fn chrome_needs_feature() {
        let result = create_renderer(RendererKind::Chrome, Duration::from_secs(1), Path::new("."));

        if cfg!(feature = "chrome") {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(StyleError::RendererUnavailable(_))));
        }
    }
}
