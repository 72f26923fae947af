//! The exported site directory that every stage works on.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use walkdir::WalkDir;

use crate::error::PipelineError;

/// An exported site on disk.
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    /// Open an output directory, failing when it does not exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PipelineError::MissingOutputDir(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file under the root with one of `extensions`, in sorted order.
    ///
    /// Extensions are compared without case and without the leading dot.
    /// Symlinks are not followed, so nothing outside the root is ever
    /// returned. Entries that cannot be read are logged and skipped.
    pub fn files_with_ext(&self, extensions: &[&str]) -> Vec<PathBuf> {
        let (files, unreadable) = self.scan(extensions);
        for (path, error) in &unreadable {
            tracing::warn!("Skipping {}: {}", self.relative(path).display(), error);
        }
        files
    }

    /// Matching files, plus every entry the walk could not read.
    fn scan(&self, extensions: &[&str]) -> (Vec<PathBuf>, Vec<(PathBuf, String)>) {
        let mut files = Vec::new();
        let mut unreadable = Vec::new();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    unreadable.push((path, e.to_string()));
                    continue;
                }
            };

            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)));
            if entry.file_type().is_file() && matches {
                files.push(entry.into_path());
            }
        }

        (files, unreadable)
    }

    pub fn html_files(&self) -> Vec<PathBuf> {
        self.files_with_ext(&["html"])
    }

    pub fn css_files(&self) -> Vec<PathBuf> {
        self.files_with_ext(&["css"])
    }

    /// Path of a file relative to the root, for log lines.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Resolve a stylesheet `href` found in `page` to a file inside the root.
    ///
    /// Returns `None` for external URLs, data URIs, and paths that leave the
    /// root.
    pub fn resolve_href(&self, page: &Path, href: &str) -> Option<PathBuf> {
        let href = href.trim();
        if is_external(href) {
            return None;
        }

        let path = href.split(['?', '#']).next().unwrap_or_default();
        if path.is_empty() {
            return None;
        }
        let decoded = percent_decode_str(path).decode_utf8().ok()?;

        let base = if decoded.starts_with('/') {
            self.root.clone()
        } else {
            page.parent().unwrap_or(&self.root).to_path_buf()
        };

        let resolved = normalize(&base.join(decoded.trim_start_matches('/')));
        let root = normalize(&self.root);
        (resolved.starts_with(&root) && resolved != root).then_some(resolved)
    }
}

fn is_external(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("//")
        || lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("data:")
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}
