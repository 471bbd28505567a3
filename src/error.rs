//! Error types for the formscan library.

use std::io;
use thiserror::Error;

/// Result type alias for formscan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting a document.
///
/// Every variant aborts the extraction of the whole document; no partial
/// [`Document`](crate::Document) is ever returned alongside an error.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading input or writing report artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not a PDF, or its structure cannot be parsed.
    #[error("Cannot open document: {0}")]
    DocumentOpen(String),

    /// A specific page could not be rasterized or its text layer read.
    #[error("Failed to render page {page}: {reason}")]
    PageRender {
        /// Page number (1-indexed)
        page: u32,
        /// Underlying cause
        reason: String,
    },

    /// An embedded image's bytes could not be decoded to pixels.
    #[error("Failed to decode image {index} on page {page}: {reason}")]
    ImageDecode {
        /// Page number (1-indexed)
        page: u32,
        /// Image index within the page (1-indexed)
        index: u32,
        /// Underlying cause
        reason: String,
    },

    /// A bitmap has a channel layout the consumer does not support.
    #[error("Unsupported image format: {0}")]
    ImageFormat(String),

    /// The OCR engine is missing or crashed.
    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    /// Error while serializing the report or drawing the chart.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Extraction was cancelled between pages.
    #[error("Extraction cancelled")]
    Cancelled,
}

impl Error {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::DocumentOpen(_) => "document_open",
            Error::PageRender { .. } => "page_render",
            Error::ImageDecode { .. } => "image_decode",
            Error::ImageFormat(_) => "image_format",
            Error::OcrUnavailable(_) => "ocr_unavailable",
            Error::Render(_) => "render",
            Error::Cancelled => "cancelled",
        }
    }

    pub(crate) fn page_render(page: u32, reason: impl std::fmt::Display) -> Self {
        Error::PageRender {
            page,
            reason: reason.to_string(),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::Decryption(_) => {
                Error::DocumentOpen("document is encrypted".to_string())
            }
            _ => Error::DocumentOpen(err.to_string()),
        }
    }
}
