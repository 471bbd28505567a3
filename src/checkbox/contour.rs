//! External contour extraction on binary images.
//!
//! Contours are traced with `imageproc`'s border following (foreground
//! 8-connected, holes 4-connected). Only outer borders without a parent are
//! external; components sitting inside a hole of another component are
//! nested and dropped.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};

/// Axis-aligned bounding box in pixels, extents inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A binary image: 255 marks foreground, 0 background.
pub(crate) struct BinaryImage {
    image: GrayImage,
}

impl BinaryImage {
    /// Threshold a gray buffer: samples below `threshold` are foreground.
    pub fn from_gray(gray: &[u8], width: usize, height: usize, threshold: u8) -> Self {
        let mut image = GrayImage::new(width as u32, height as u32);
        for (pixel, &value) in image.pixels_mut().zip(gray) {
            *pixel = Luma([if value < threshold { 255 } else { 0 }]);
        }
        Self { image }
    }

    #[cfg(test)]
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.len()) as u32;
        let mut image = GrayImage::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, b) in row.bytes().enumerate() {
                if b == b'#' {
                    image.put_pixel(x as u32, y as u32, Luma([255]));
                }
            }
        }
        Self { image }
    }

    #[cfg(test)]
    fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] != 0
    }

    /// Bounding boxes of all external foreground components, in raster
    /// order of their first pixel.
    pub fn external_boxes(&self) -> Vec<BoundingBox> {
        if self.image.width() == 0 || self.image.height() == 0 {
            return Vec::new();
        }

        find_contours::<u32>(&self.image)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|contour| {
                let min_x = contour.points.iter().map(|p| p.x).min()?;
                let max_x = contour.points.iter().map(|p| p.x).max()?;
                let min_y = contour.points.iter().map(|p| p.y).min()?;
                let max_y = contour.points.iter().map(|p| p.y).max()?;
                Some(BoundingBox {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                })
            })
            .collect()
    }
}
