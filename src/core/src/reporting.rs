//! Report orchestration and rendering.
//!
//! - `report_builder`: drives the aggregator over every host and program, caching results.
//! - `renderer`: the rendering collaborator interface and its SVG implementation.
//! - `types`: charts, output keys and run summaries.

pub mod renderer;
pub mod report_builder;
pub mod types;

#[cfg(test)]
mod tests;

pub use renderer::{Renderer, SvgRenderer};
pub use report_builder::ReportBuilder;
pub use types::{output_key, Chart, ChartData, FailurePolicy, ReportSummary};
