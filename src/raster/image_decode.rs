//! Embedded image decoding.
//!
//! Turns an [`EmbeddedImage`] into a [`Bitmap`]: JPEG streams go through
//! the `image` crate, raw samples are unpacked according to the image's
//! color space and bit depth.

use crate::error::Error;
use crate::model::Bitmap;
use crate::parser::{ColorSpace, EmbeddedImage, ImageFilter};

/// Why an embedded image could not be turned into pixels.
///
/// Carries no page context; [`DecodeFailure::at`] attaches it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DecodeFailure(pub String);

impl DecodeFailure {
    fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Convert to an [`Error::ImageDecode`] for a specific image.
    pub fn at(self, page: u32, index: u32) -> Error {
        Error::ImageDecode {
            page,
            index,
            reason: self.0,
        }
    }
}

type DecodeResult<T> = std::result::Result<T, DecodeFailure>;

/// Decode an embedded image to a gray or RGB bitmap.
pub fn decode_image(image: &EmbeddedImage) -> DecodeResult<Bitmap> {
    match &image.filter {
        ImageFilter::Dct => {
            let decoded = ::image::load_from_memory(&image.data)
                .map_err(|e| DecodeFailure::new(format!("JPEG: {}", e)))?;
            Ok(Bitmap::from(decoded))
        }
        ImageFilter::Raw => decode_raw(image),
        ImageFilter::Jpx => Err(DecodeFailure::new("JPEG 2000 images are not supported")),
        ImageFilter::Ccitt => Err(DecodeFailure::new("CCITT fax images are not supported")),
        ImageFilter::Jbig2 => Err(DecodeFailure::new("JBIG2 images are not supported")),
        ImageFilter::Corrupt(reason) => Err(DecodeFailure::new(format!(
            "stream decompression failed: {}",
            reason
        ))),
    }
}

fn decode_raw(image: &EmbeddedImage) -> DecodeResult<Bitmap> {
    let (width, height) = (image.width, image.height);
    if width == 0 || height == 0 {
        return Err(DecodeFailure::new("image has zero width or height"));
    }

    let components = image.color_space.components().ok_or_else(|| {
        DecodeFailure::new(format!("unsupported color space {:?}", image.color_space))
    })?;
    let samples = unpack_samples(image, components)?;

    let (channels, data) = match &image.color_space {
        ColorSpace::Gray => (1, samples),
        ColorSpace::Rgb => (3, samples),
        ColorSpace::Cmyk => (3, cmyk_to_rgb_samples(&samples)),
        ColorSpace::Indexed {
            base,
            hival,
            lookup,
        } => expand_palette(&samples, base, *hival, lookup)?,
        ColorSpace::Other(name) => {
            return Err(DecodeFailure::new(format!("unsupported color space {}", name)))
        }
    };

    Bitmap::new(width, height, channels, data).map_err(|e| DecodeFailure::new(e.to_string()))
}

/// Unpack the stream into one byte per sample, scaled to 0..=255 except
/// for palette indices.
fn unpack_samples(image: &EmbeddedImage, components: usize) -> DecodeResult<Vec<u8>> {
    let width = image.width as usize;
    let height = image.height as usize;
    let bpc = image.bits_per_component as usize;
    let indexed = matches!(image.color_space, ColorSpace::Indexed { .. });

    let pixels = width
        .checked_mul(height)
        .ok_or_else(|| DecodeFailure::new("image dimensions overflow"))?;

    match bpc {
        8 => {
            let expected = pixels
                .checked_mul(components)
                .ok_or_else(|| DecodeFailure::new("image dimensions overflow"))?;
            if image.data.len() < expected {
                return Err(DecodeFailure::new(format!(
                    "short buffer: {} bytes for {}x{}x{}",
                    image.data.len(),
                    width,
                    height,
                    components
                )));
            }
            Ok(image.data[..expected].to_vec())
        }
        1 | 2 | 4 if components == 1 => {
            let row_bytes = width
                .checked_mul(bpc)
                .map(|bits| (bits + 7) / 8)
                .ok_or_else(|| DecodeFailure::new("image dimensions overflow"))?;
            let expected = row_bytes
                .checked_mul(height)
                .ok_or_else(|| DecodeFailure::new("image dimensions overflow"))?;
            if image.data.len() < expected {
                return Err(DecodeFailure::new(format!(
                    "short buffer: {} bytes for {}x{} at {} bits",
                    image.data.len(),
                    width,
                    height,
                    bpc
                )));
            }
            let max = (1u16 << bpc) - 1;
            let mut out = Vec::with_capacity(pixels);
            for row in image.data.chunks(row_bytes).take(height) {
                for x in 0..width {
                    let bit = x * bpc;
                    let shift = 8 - bpc - (bit % 8);
                    let value = (row[bit / 8] >> shift) as u16 & max;
                    out.push(if indexed {
                        value as u8
                    } else {
                        (value * 255 / max) as u8
                    });
                }
            }
            Ok(out)
        }
        other => Err(DecodeFailure::new(format!(
            "unsupported bit depth {} for {} components",
            other, components
        ))),
    }
}

fn cmyk_to_rgb_samples(samples: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(samples.len() / 4 * 3);
    for px in samples.chunks_exact(4) {
        let k = 255 - px[3] as u16;
        for c in &px[..3] {
            rgb.push(((255 - *c as u16) * k / 255) as u8);
        }
    }
    rgb
}

fn expand_palette(
    indices: &[u8],
    base: &ColorSpace,
    hival: u8,
    lookup: &[u8],
) -> DecodeResult<(u8, Vec<u8>)> {
    let base_components = match base {
        ColorSpace::Gray => 1,
        ColorSpace::Rgb => 3,
        ColorSpace::Cmyk => 4,
        other => {
            return Err(DecodeFailure::new(format!(
                "unsupported palette base {:?}",
                other
            )))
        }
    };
    let entries = hival as usize + 1;
    if lookup.len() < entries * base_components {
        return Err(DecodeFailure::new("palette lookup table is truncated"));
    }

    let mut expanded = Vec::with_capacity(indices.len() * base_components);
    for &index in indices {
        let i = (index as usize).min(hival as usize) * base_components;
        expanded.extend_from_slice(&lookup[i..i + base_components]);
    }

    Ok(match base_components {
        1 => (1, expanded),
        3 => (3, expanded),
        _ => (3, cmyk_to_rgb_samples(&expanded)),
    })
}
