//! Report output: JSON serialization, the checkbox chart and sinks.

pub mod chart;
mod json;
mod sink;

pub use chart::{render_chart, ChartOptions};
pub use json::{to_json, JsonFormat};
pub use sink::{DirectorySink, ReportArtifacts, ReportSink};
