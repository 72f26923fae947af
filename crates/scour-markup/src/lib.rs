//! HTML processing for exported static sites.
//!
//! This crate provides the markup-level pieces of the optimizer: a tag scanner
//! that edits documents in place, script stripping, and whole-document
//! minification.

pub mod error;
pub mod minify;
pub mod strip;
pub mod tag;

pub use error::MarkupError;
pub use minify::{minify_html, MinifyOptions};
pub use strip::{strip_scripts, StripOptions, StripStats};
pub use tag::{rewrite, tokenize, visit, Attribute, Edit, StartTag, Token, TokenKind};
