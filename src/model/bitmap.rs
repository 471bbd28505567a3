//! In-memory pixel buffers.

use crate::error::{Error, Result};
use image::{DynamicImage, ImageBuffer};

/// A decoded, interleaved 8-bit pixel buffer.
///
/// Rows are stored top to bottom with no padding. The channel count is not
/// restricted here; consumers reject layouts they cannot handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Bitmap {
    /// Wrap raw samples, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if channels == 0 {
            return Err(Error::ImageFormat("bitmap has zero channels".to_string()));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .ok_or_else(|| {
                Error::ImageFormat(format!(
                    "bitmap dimensions {}x{}x{} overflow",
                    width, height, channels
                ))
            })?;
        if data.len() != expected {
            return Err(Error::ImageFormat(format!(
                "buffer of {} bytes does not match {}x{}x{}",
                data.len(),
                width,
                height,
                channels
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Create a bitmap with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Self {
        let len = width as usize * height as usize * channels.max(1) as usize;
        Self {
            width,
            height,
            channels: channels.max(1),
            data: vec![value; len],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Raw interleaved samples.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw samples.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Samples of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        self.data.get(start..start + c)
    }

    /// Check whether the bitmap has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Convert to an `image` crate buffer (gray, RGB or RGBA).
    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let data = self.data.clone();
        let image = match self.channels {
            1 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            2 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
            3 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            4 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
            n => {
                return Err(Error::ImageFormat(format!(
                    "cannot convert {}-channel bitmap",
                    n
                )))
            }
        };
        image.ok_or_else(|| Error::ImageFormat("bitmap buffer size mismatch".to_string()))
    }
}

impl From<DynamicImage> for Bitmap {
    fn from(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (channels, data) = match image {
            DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
            other if other.color().has_alpha() => (4, other.to_rgba8().into_raw()),
            other if !other.color().has_color() => (1, other.to_luma8().into_raw()),
            other => (3, other.to_rgb8().into_raw()),
        };
        Self {
            width,
            height,
            channels,
            data,
        }
    }
}
