//! OCR engine abstraction.
//!
//! The pipeline talks to OCR through the [`OcrEngine`] trait so tests and
//! callers can substitute their own recognizer. [`TesseractEngine`] drives
//! the `tesseract` command-line program.

mod tesseract;

pub use tesseract::{TesseractConfig, TesseractEngine};

use crate::error::Result;
use crate::model::Bitmap;

/// Recognizes text in a raster image.
///
/// Implementations must be usable from several pages at once.
pub trait OcrEngine: Send + Sync {
    /// Engine name for diagnostics.
    fn name(&self) -> &str;

    /// Recognize text in an image. An image without text yields an empty
    /// string, not an error.
    ///
    /// Returns [`Error::OcrUnavailable`](crate::Error::OcrUnavailable) when
    /// the engine is missing or fails, and
    /// [`Error::ImageFormat`](crate::Error::ImageFormat) for bitmaps the
    /// engine cannot accept.
    fn recognize(&self, image: &Bitmap) -> Result<String>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&self, image: &Bitmap) -> Result<String> {
        (**self).recognize(image)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&self, image: &Bitmap) -> Result<String> {
        (**self).recognize(image)
    }
}

/// Engine that recognizes nothing.
///
/// Used when only text layers and checkboxes are wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcr;

impl OcrEngine for NoOcr {
    fn name(&self) -> &str {
        "none"
    }

    fn recognize(&self, _image: &Bitmap) -> Result<String> {
        Ok(String::new())
    }
}
