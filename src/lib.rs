//! # formscan
//!
//! PDF form extraction library for Rust.
//!
//! This library turns a PDF into structured data: the text layer of every
//! page, OCR text for each embedded image, and a count of checkbox-like
//! squares found on the rasterized pages. The result serializes to a JSON
//! report and can be summarized as a per-page bar chart.
//!
//! ## Quick Start
//!
//! ```no_run
//! use formscan::{extract_file, render, TesseractEngine};
//!
//! fn main() -> formscan::Result<()> {
//!     let ocr = TesseractEngine::default();
//!     let doc = extract_file("form.pdf", &ocr)?;
//!
//!     println!("{} checkboxes", doc.checkbox_count());
//!     let json = render::to_json(&doc, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Rasterization**: pages are drawn with `tiny-skia` at 72 DPI, text
//!   included, then annotation appearances on top
//! - **OCR**: embedded images go through an [`OcrEngine`], by default the
//!   `tesseract` executable
//! - **Checkbox detection**: external contours with a small, square
//!   bounding box
//! - **Parallel processing**: pages are extracted with Rayon, results stay
//!   in page order

pub mod checkbox;
pub mod detect;
pub mod error;
pub mod model;
pub mod ocr;
pub mod parser;
pub mod raster;
pub mod render;

// Re-export commonly used types
pub use checkbox::{CheckboxDetector, CheckboxGeometry, CheckboxShape};
pub use detect::{detect_header, is_pdf_bytes, PdfHeader};
pub use error::{Error, Result};
pub use model::{Bitmap, Document, ImageResult, Metadata, Page};
pub use ocr::{NoOcr, OcrEngine, TesseractConfig, TesseractEngine};
pub use parser::{
    CancellationToken, DocumentExtractor, ErrorMode, ExtractOptions, LopdfBackend, PdfBackend,
};
pub use raster::RasterOptions;
pub use render::{ChartOptions, DirectorySink, JsonFormat, ReportArtifacts, ReportSink};

use std::io::Read;
use std::path::Path;

/// Extract a PDF file into a structured document.
///
/// # Arguments
///
/// * `path` - Path to the PDF file
/// * `ocr` - Engine used for embedded images
///
/// # Example
///
/// ```no_run
/// use formscan::{extract_file, TesseractEngine};
///
/// let doc = extract_file("form.pdf", &TesseractEngine::default()).unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P, ocr: &dyn OcrEngine) -> Result<Document> {
    DocumentExtractor::open(path)?.extract(ocr)
}

/// Extract a PDF file with custom options.
///
/// # Example
///
/// ```no_run
/// use formscan::{extract_file_with_options, ExtractOptions, NoOcr};
///
/// let options = ExtractOptions::new()
///     .lenient()
///     .sequential();
/// let doc = extract_file_with_options("form.pdf", &NoOcr, options).unwrap();
/// ```
pub fn extract_file_with_options<P: AsRef<Path>>(
    path: P,
    ocr: &dyn OcrEngine,
    options: ExtractOptions,
) -> Result<Document> {
    DocumentExtractor::open_with_options(path, options)?.extract(ocr)
}

/// Extract a PDF held in memory.
///
/// # Example
///
/// ```no_run
/// use formscan::{extract_bytes, NoOcr};
///
/// let data = std::fs::read("form.pdf").unwrap();
/// let doc = extract_bytes(&data, &NoOcr).unwrap();
/// ```
pub fn extract_bytes(data: &[u8], ocr: &dyn OcrEngine) -> Result<Document> {
    DocumentExtractor::from_bytes(data)?.extract(ocr)
}

/// Extract a PDF held in memory with custom options.
pub fn extract_bytes_with_options(
    data: &[u8],
    ocr: &dyn OcrEngine,
    options: ExtractOptions,
) -> Result<Document> {
    DocumentExtractor::from_bytes_with_options(data, options)?.extract(ocr)
}

/// Extract a PDF from a reader.
///
/// # Example
///
/// ```no_run
/// use formscan::{extract_reader, NoOcr};
/// use std::fs::File;
///
/// let file = File::open("form.pdf").unwrap();
/// let doc = extract_reader(file, &NoOcr).unwrap();
/// ```
pub fn extract_reader<R: Read>(reader: R, ocr: &dyn OcrEngine) -> Result<Document> {
    DocumentExtractor::from_reader(reader)?.extract(ocr)
}

/// Extract a PDF from a reader with custom options.
pub fn extract_reader_with_options<R: Read>(
    reader: R,
    ocr: &dyn OcrEngine,
    options: ExtractOptions,
) -> Result<Document> {
    DocumentExtractor::from_reader_with_options(reader, options)?.extract(ocr)
}

/// Count checkboxes on every page of a PDF file, without OCR.
///
/// Returns one count per page, in page order.
pub fn count_checkboxes<P: AsRef<Path>>(path: P, options: ExtractOptions) -> Result<Vec<u32>> {
    DocumentExtractor::open_with_options(path, options)?.count_checkboxes()
}

/// Builder for extracting PDF forms and producing reports.
///
/// # Example
///
/// ```no_run
/// use formscan::{Formscan, JsonFormat, TesseractConfig};
///
/// let result = Formscan::new()
///     .with_tesseract(TesseractConfig::default().with_language("deu"))
///     .lenient()
///     .extract("form.pdf")?;
///
/// let json = result.to_json(JsonFormat::Pretty)?;
/// let chart = result.chart_png()?;
/// # Ok::<(), formscan::Error>(())
/// ```
pub struct Formscan {
    options: ExtractOptions,
    ocr: Box<dyn OcrEngine>,
    chart_options: ChartOptions,
}

impl Formscan {
    /// Create a builder using tesseract at its platform default location.
    pub fn new() -> Self {
        Self {
            options: ExtractOptions::default(),
            ocr: Box::new(TesseractEngine::default()),
            chart_options: ChartOptions::default(),
        }
    }

    /// Use tesseract with a specific configuration.
    pub fn with_tesseract(mut self, config: TesseractConfig) -> Self {
        self.ocr = Box::new(TesseractEngine::new(config));
        self
    }

    /// Use a custom OCR engine.
    pub fn with_ocr<E: OcrEngine + 'static>(mut self, engine: E) -> Self {
        self.ocr = Box::new(engine);
        self
    }

    /// Skip OCR; embedded images get empty text.
    pub fn without_ocr(self) -> Self {
        self.with_ocr(NoOcr)
    }

    /// Enable lenient mode.
    pub fn lenient(mut self) -> Self {
        self.options = self.options.lenient();
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Set rasterization resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.options = self.options.with_dpi(dpi);
        self
    }

    /// Set the checkbox geometry window.
    pub fn with_geometry(mut self, geometry: CheckboxGeometry) -> Self {
        self.options = self.options.with_geometry(geometry);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.options = self.options.with_cancellation(token);
        self
    }

    /// Set chart layout.
    pub fn with_chart(mut self, options: ChartOptions) -> Self {
        self.chart_options = options;
        self
    }

    /// Extract a PDF file and return a result wrapper.
    pub fn extract<P: AsRef<Path>>(self, path: P) -> Result<FormscanResult> {
        let extractor = DocumentExtractor::open_with_options(path, self.options)?;
        let document = extractor.extract(self.ocr.as_ref())?;
        Ok(FormscanResult {
            document,
            chart_options: self.chart_options,
        })
    }

    /// Extract a PDF from bytes.
    pub fn extract_bytes(self, data: &[u8]) -> Result<FormscanResult> {
        let extractor = DocumentExtractor::from_bytes_with_options(data, self.options)?;
        let document = extractor.extract(self.ocr.as_ref())?;
        Ok(FormscanResult {
            document,
            chart_options: self.chart_options,
        })
    }
}

impl Default for Formscan {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of extracting a PDF document.
pub struct FormscanResult {
    /// The extracted document
    pub document: Document,
    chart_options: ChartOptions,
}

impl FormscanResult {
    /// Convert to the JSON report.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.document, format)
    }

    /// Render the per-page checkbox chart as PNG.
    pub fn chart_png(&self) -> Result<Vec<u8>> {
        render::render_chart(self.document.page_checkbox_counts(), &self.chart_options)
    }

    /// Write the report through a sink.
    pub fn write_to(&self, sink: &dyn ReportSink, name: &str) -> Result<ReportArtifacts> {
        sink.write(name, &self.document)
    }

    /// Get the document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formscan_builder() {
        let builder = Formscan::new().lenient().sequential().with_dpi(144);

        assert_eq!(builder.options.error_mode, ErrorMode::Lenient);
        assert!(!builder.options.parallel);
        assert_eq!(builder.options.raster.dpi, 144);
        assert_eq!(builder.ocr.name(), "tesseract");
    }

    #[test]
    fn test_formscan_without_ocr() {
        let builder = Formscan::default().without_ocr();
        assert_eq!(builder.ocr.name(), "none");
    }

    #[test]
    fn test_extract_bytes_empty_data() {
        let result = extract_bytes(&[], &NoOcr);
        assert!(matches!(result, Err(Error::DocumentOpen(_))));
    }

    #[test]
    fn test_extract_bytes_too_short() {
        let result = extract_bytes(b"%PDF", &NoOcr);
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_bytes_unknown_magic() {
        let data = b"<!DOCTYPE html><html></html>";
        let result = extract_bytes(data, &NoOcr);
        assert!(matches!(result, Err(Error::DocumentOpen(_))));
    }

    #[test]
    fn test_builder_extract_invalid_bytes() {
        let result = Formscan::new().without_ocr().extract_bytes(b"not a pdf");
        assert!(result.is_err());
    }

    #[test]
    fn test_result_outputs() {
        let mut document = Document::new();
        document.push_page(Page::new(1, "a"), 1);
        document.push_page(Page::new(2, "b"), 4);
        let result = FormscanResult {
            document,
            chart_options: ChartOptions::default(),
        };

        assert!(result.to_json(JsonFormat::Compact).unwrap().contains("\"checkbox_count\":5"));
        assert!(result.chart_png().unwrap().starts_with(b"\x89PNG"));
        assert_eq!(result.document().page_count(), 2);
    }
}
