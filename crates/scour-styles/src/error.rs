//! Error types for stylesheet processing.

/// Errors that can occur while optimizing stylesheets.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("Failed to parse CSS: {file}: {message}")]
    ParseError { file: String, message: String },

    #[error("Failed to minify CSS: {file}: {message}")]
    MinifyError { file: String, message: String },

    #[error("Failed to print CSS: {file}: {message}")]
    PrintError { file: String, message: String },

    #[error("Invalid safelist pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Failed to render {page}: {message}")]
    RenderError { page: String, message: String },

    #[error("Failed to serve {root} for rendering: {source}")]
    ServeError {
        root: String,
        source: std::io::Error,
    },

    #[error("Renderer '{0}' is not available in this build")]
    RendererUnavailable(String),
}
