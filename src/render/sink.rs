//! Report sinks: where extraction results end up.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::Document;

use super::chart::{render_chart, ChartOptions};
use super::json::{to_json, JsonFormat};

/// Files produced for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    /// The JSON report
    pub json: PathBuf,
    /// The checkbox chart, if one was written
    pub chart: Option<PathBuf>,
}

/// Receives a finished [`Document`].
pub trait ReportSink {
    /// Persist the report for a document called `name`.
    fn write(&self, name: &str, doc: &Document) -> Result<ReportArtifacts>;
}

/// Writes `<name>.json` and `<name>.png` into a directory.
///
/// Both artifacts are rendered in memory before anything touches the
/// disk, so a rendering failure leaves the directory unchanged.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    format: JsonFormat,
    chart: Option<ChartOptions>,
}

impl DirectorySink {
    /// Sink writing pretty JSON and a default chart into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: JsonFormat::Pretty,
            chart: Some(ChartOptions::default()),
        }
    }

    /// Set the JSON format.
    pub fn with_format(mut self, format: JsonFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the chart options.
    pub fn with_chart(mut self, options: ChartOptions) -> Self {
        self.chart = Some(options);
        self
    }

    /// Do not write a chart.
    pub fn without_chart(mut self) -> Self {
        self.chart = None;
        self
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for DirectorySink {
    fn write(&self, name: &str, doc: &Document) -> Result<ReportArtifacts> {
        let json = to_json(doc, self.format)?;
        let chart = self
            .chart
            .as_ref()
            .map(|options| render_chart(doc.page_checkbox_counts(), options))
            .transpose()?;

        fs::create_dir_all(&self.dir)?;

        let json_path = self.dir.join(format!("{}.json", name));
        fs::write(&json_path, json)?;
        log::info!("Wrote {}", json_path.display());

        let chart_path = match chart {
            Some(png) => {
                let path = self.dir.join(format!("{}.png", name));
                fs::write(&path, png)?;
                log::info!("Wrote {}", path.display());
                Some(path)
            }
            None => None,
        };

        Ok(ReportArtifacts {
            json: json_path,
            chart: chart_path,
        })
    }
}
