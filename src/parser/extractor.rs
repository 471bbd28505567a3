//! Page and document extraction.

use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::checkbox::CheckboxDetector;
use crate::error::{Error, Result};
use crate::model::{Document, Metadata, Page};
use crate::ocr::OcrEngine;
use crate::raster::{decode_image, PageRenderer};

use super::backend::{EmbeddedImage, LopdfBackend, PdfBackend};
use super::options::{ErrorMode, ExtractOptions};

/// Extracts a single page: text, embedded image OCR and checkbox count.
pub struct PageExtractor<'a> {
    renderer: PageRenderer,
    detector: CheckboxDetector,
    ocr: &'a dyn OcrEngine,
    error_mode: ErrorMode,
}

impl<'a> PageExtractor<'a> {
    /// Create a page extractor using `ocr` for embedded images.
    pub fn new(ocr: &'a dyn OcrEngine, options: &ExtractOptions) -> Self {
        Self {
            renderer: PageRenderer::new(options.raster),
            detector: CheckboxDetector::new(options.geometry),
            ocr,
            error_mode: options.error_mode,
        }
    }

    /// Extract one page, returning the page record and its checkbox count.
    pub fn extract<B: PdfBackend + ?Sized>(&self, backend: &B, page: u32) -> Result<(Page, u32)> {
        let rendered = self.renderer.render_page(backend, page)?;
        let checkbox_count = self.detector.count(&rendered.bitmap)?;

        let mut record = Page::new(page, rendered.text);
        for (i, image) in rendered.images.iter().enumerate() {
            let index = i as u32 + 1;
            let text = match self.recognize(page, index, image) {
                Ok(text) => text,
                Err(e) if self.error_mode == ErrorMode::Lenient && is_per_image(&e) => {
                    log::warn!("Page {} image {}: {}; using empty OCR text", page, index, e);
                    String::new()
                }
                Err(e) => return Err(e),
            };
            record.add_image(text);
        }

        log::debug!(
            "Page {}: {} chars of text, {} images, {} checkboxes",
            page,
            record.text.len(),
            record.image_count(),
            checkbox_count
        );
        Ok((record, checkbox_count))
    }

    fn recognize(&self, page: u32, index: u32, image: &EmbeddedImage) -> Result<String> {
        let bitmap = decode_image(image).map_err(|e| e.at(page, index))?;
        self.ocr.recognize(&bitmap)
    }
}

/// Errors that concern one image rather than the document or environment.
fn is_per_image(err: &Error) -> bool {
    matches!(err, Error::ImageDecode { .. } | Error::ImageFormat(_))
}

/// Extracts every page of a document into a [`Document`].
///
/// Owns the open document; it is released when the extractor is dropped.
pub struct DocumentExtractor<B: PdfBackend = LopdfBackend> {
    backend: B,
    options: ExtractOptions,
}

impl DocumentExtractor<LopdfBackend> {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ExtractOptions::default())
    }

    /// Open a PDF file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ExtractOptions) -> Result<Self> {
        Ok(Self::with_backend(LopdfBackend::load_file(path)?, options))
    }

    /// Open a PDF from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ExtractOptions::default())
    }

    /// Open a PDF from bytes with custom options.
    pub fn from_bytes_with_options(data: &[u8], options: ExtractOptions) -> Result<Self> {
        Ok(Self::with_backend(LopdfBackend::load_bytes(data)?, options))
    }

    /// Open a PDF from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, ExtractOptions::default())
    }

    /// Open a PDF from a reader with custom options.
    pub fn from_reader_with_options<R: Read>(reader: R, options: ExtractOptions) -> Result<Self> {
        Ok(Self::with_backend(LopdfBackend::load_reader(reader)?, options))
    }
}

impl<B: PdfBackend> DocumentExtractor<B> {
    /// Wrap an already opened backend.
    pub fn with_backend(backend: B, options: ExtractOptions) -> Self {
        Self { backend, options }
    }

    /// Options in use.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// The underlying document.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.backend.page_count()
    }

    /// Document metadata.
    pub fn metadata(&self) -> Metadata {
        self.backend.metadata()
    }

    /// Extract all pages.
    ///
    /// Fails with the first error in page order; no partial document is
    /// returned.
    pub fn extract(&self, ocr: &dyn OcrEngine) -> Result<Document> {
        let start = Instant::now();
        let extractor = PageExtractor::new(ocr, &self.options);
        let pages = self.for_each_page(|page| extractor.extract(&self.backend, page))?;

        let mut document = Document::with_metadata(self.backend.metadata());
        for (page, checkbox_count) in pages {
            document.push_page(page, checkbox_count);
        }

        log::info!(
            "Extracted {} pages, {} images, {} checkboxes in {:.2?}",
            document.page_count(),
            document.image_count(),
            document.checkbox_count(),
            start.elapsed()
        );
        Ok(document)
    }

    /// Render every page and count checkboxes, without text or OCR.
    pub fn count_checkboxes(&self) -> Result<Vec<u32>> {
        let renderer = PageRenderer::new(self.options.raster);
        let detector = CheckboxDetector::new(self.options.geometry);
        self.for_each_page(|page| {
            let bitmap = renderer.rasterize(&self.backend, page)?;
            detector.count(&bitmap)
        })
    }

    /// Run `f` for pages 1..=N, in parallel if enabled, preserving order.
    fn for_each_page<T, F>(&self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(u32) -> Result<T> + Sync,
    {
        let total = self.backend.page_count();
        let done = AtomicU32::new(0);

        let task = |page: u32| -> Result<T> {
            if self.options.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let value = f(page)?;
            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(ref callback) = self.options.on_page {
                callback(finished, total);
            }
            Ok(value)
        };

        if self.options.parallel && total > 1 {
            let results: Vec<Result<T>> = (1..=total).into_par_iter().map(&task).collect();
            results.into_iter().collect()
        } else {
            (1..=total).map(task).collect()
        }
    }
}
