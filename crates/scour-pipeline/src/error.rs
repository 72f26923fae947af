//! Pipeline errors.

use std::path::PathBuf;

use scour_styles::StyleError;

/// Errors that stop a stage or the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Output directory not found: {0}")]
    MissingOutputDir(PathBuf),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error(transparent)]
    Style(#[from] StyleError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
