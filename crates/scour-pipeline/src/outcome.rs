//! Per-file results collected by a stage.

use std::path::{Path, PathBuf};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome<T> {
    Processed { path: PathBuf, metrics: T },
    Failed { path: PathBuf, cause: String },
}

impl<T> FileOutcome<T> {
    pub fn path(&self) -> &Path {
        match self {
            Self::Processed { path, .. } | Self::Failed { path, .. } => path,
        }
    }
}

/// Outcomes of one stage over a set of files, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport<T> {
    pub outcomes: Vec<FileOutcome<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&mut self, path: impl Into<PathBuf>, metrics: T) {
        self.outcomes.push(FileOutcome::Processed {
            path: path.into(),
            metrics,
        });
    }

    /// Record a failure and log it.
    pub fn failed(&mut self, path: impl Into<PathBuf>, cause: impl ToString) {
        let path = path.into();
        let cause = cause.to_string();
        tracing::error!("{}: {}", path.display(), cause);
        self.outcomes.push(FileOutcome::Failed { path, cause });
    }

    /// Metrics of every file that succeeded.
    pub fn successes(&self) -> impl Iterator<Item = (&Path, &T)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Processed { path, metrics } => Some((path.as_path(), metrics)),
            FileOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Failed { path, cause } => Some((path.as_path(), cause.as_str())),
            FileOutcome::Processed { .. } => None,
        })
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}
