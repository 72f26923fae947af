//! Post-build optimization of exported static sites.
//!
//! Each stage rewrites an output directory in place: [`run_strip`] removes
//! JavaScript, [`run_styles`] purges, inlines and defers CSS, and
//! [`run_minify`] compresses HTML. The [`Orchestrator`] runs the site build
//! and all three stages in order.

pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod stages;
pub mod tree;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, ProcessRunner, Step, StepRunner};
pub use outcome::{BatchReport, FileOutcome};
pub use stages::{
    optimize_styles, run_minify, run_strip, run_styles, CriticalMetrics, MinifyMetrics,
    MinifySummary, PurgeMetrics, StripConfig, StripReport, StylesConfig, StylesReport,
};
pub use tree::OutputTree;
