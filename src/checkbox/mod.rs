//! Checkbox detection on rasterized pages.
//!
//! The heuristic converts the page to grayscale, binarizes it, extracts the
//! outermost contours of ink regions and counts the bounding boxes that are
//! small and nearly square.
//!
//! ## Example
//!
//! ```
//! use formscan::{Bitmap, CheckboxDetector};
//!
//! let blank = Bitmap::filled(100, 100, 3, 255);
//! let detector = CheckboxDetector::default();
//! assert_eq!(detector.count(&blank).unwrap(), 0);
//! ```

mod contour;
mod geometry;

pub use contour::BoundingBox;
pub use geometry::CheckboxGeometry;

use crate::error::{Error, Result};
use crate::model::Bitmap;
use contour::BinaryImage;

/// A contour whose bounding box matched the checkbox geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckboxShape {
    pub bounding_box: BoundingBox,
}

/// Counts checkbox-like shapes in a page bitmap.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckboxDetector {
    geometry: CheckboxGeometry,
}

impl CheckboxDetector {
    /// Create a detector with a custom geometry window.
    pub fn new(geometry: CheckboxGeometry) -> Self {
        Self { geometry }
    }

    /// Geometry window in use.
    pub fn geometry(&self) -> &CheckboxGeometry {
        &self.geometry
    }

    /// Shapes that match the checkbox geometry, in raster order.
    pub fn shapes(&self, bitmap: &Bitmap) -> Result<Vec<CheckboxShape>> {
        let gray = to_grayscale(bitmap)?;
        let binary = BinaryImage::from_gray(
            &gray,
            bitmap.width() as usize,
            bitmap.height() as usize,
            self.geometry.threshold,
        );

        Ok(binary
            .external_boxes()
            .into_iter()
            .filter(|b| self.geometry.matches(b.width as f64, b.height as f64))
            .map(|bounding_box| CheckboxShape { bounding_box })
            .collect())
    }

    /// Number of checkbox-like shapes.
    pub fn count(&self, bitmap: &Bitmap) -> Result<u32> {
        Ok(self.shapes(bitmap)?.len() as u32)
    }
}

/// Convert a gray, RGB or RGBA bitmap to one gray byte per pixel.
///
/// RGB uses BT.601 weights in 14-bit fixed point; alpha is ignored.
pub fn to_grayscale(bitmap: &Bitmap) -> Result<Vec<u8>> {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    const ROUND: u32 = 1 << 13;

    match bitmap.channels() {
        1 => Ok(bitmap.data().to_vec()),
        c @ (3 | 4) => Ok(bitmap
            .data()
            .chunks_exact(c as usize)
            .map(|px| {
                ((R * px[0] as u32 + G * px[1] as u32 + B * px[2] as u32 + ROUND) >> 14) as u8
            })
            .collect()),
        n => Err(Error::ImageFormat(format!(
            "checkbox detection needs 1, 3 or 4 channels, got {}",
            n
        ))),
    }
}
