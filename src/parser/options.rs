//! Extraction options and configuration.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::checkbox::CheckboxGeometry;
use crate::raster::RasterOptions;

/// Callback invoked after each page with `(pages_done, total_pages)`.
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Options for extracting a PDF document.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Whether to process pages in parallel
    pub parallel: bool,

    /// Page rasterization settings
    pub raster: RasterOptions,

    /// Checkbox size and shape window
    pub geometry: CheckboxGeometry,

    /// Token checked before each page
    pub cancel: Option<CancellationToken>,

    /// Progress callback
    pub on_page: Option<ProgressCallback>,
}

impl ExtractOptions {
    /// Create new extract options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (undecodable images get empty OCR text).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set rasterization resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.raster = RasterOptions::with_dpi(dpi);
        self
    }

    /// Set the checkbox geometry window.
    pub fn with_geometry(mut self, geometry: CheckboxGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Attach a progress callback.
    pub fn on_page<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, u32) + Send + Sync + 'static,
    {
        self.on_page = Some(Arc::new(callback));
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Strict,
            parallel: true,
            raster: RasterOptions::default(),
            geometry: CheckboxGeometry::default(),
            cancel: None,
            on_page: None,
        }
    }
}

impl fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("error_mode", &self.error_mode)
            .field("parallel", &self.parallel)
            .field("raster", &self.raster)
            .field("geometry", &self.geometry)
            .field("cancel", &self.cancel)
            .field("on_page", &self.on_page.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Error handling mode during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail on any error
    #[default]
    Strict,
    /// Give undecodable images empty OCR text and continue
    Lenient,
}

/// Shared flag that stops an extraction between pages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
