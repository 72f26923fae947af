//! The three in-place stages, run in this order by the orchestrator.

pub mod minify;
pub mod strip;
pub mod styles;

pub use minify::{run_minify, MinifyMetrics, MinifySummary};
pub use strip::{run_strip, StripConfig, StripReport};
pub use styles::{
    optimize_styles, run_styles, CriticalMetrics, PurgeMetrics, StylesConfig, StylesReport,
};
