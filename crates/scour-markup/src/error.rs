//! Error types for markup processing.

/// Errors that can occur while rewriting or minifying HTML.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("Minified output is not valid UTF-8: {0}")]
    Encoding(String),
}
