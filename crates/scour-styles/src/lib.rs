//! Stylesheet optimization for exported static sites.
//!
//! This crate removes CSS rules no page uses, extracts and inlines the CSS
//! each page needs for first paint, and rewrites the remaining stylesheet
//! links to load without blocking render.

pub mod critical;
pub mod defer;
pub mod error;
mod filter;
pub mod purge;
mod rebase;
pub mod render;
pub mod usage;

pub use critical::{
    extract_critical, fold_usage, inline_critical, stylesheet_hrefs, CriticalCss, ExtractedSheet,
};
pub use defer::defer_stylesheets;
pub use error::StyleError;
pub use filter::FilterStats;
pub use purge::{minify_css, purge_css, PurgedCss};
pub use render::{
    create_renderer, FlowRenderer, FoldRenderer, RendererKind, Viewport, DEFAULT_VIEWPORTS,
};
pub use usage::{Safelist, UsageIndex};
