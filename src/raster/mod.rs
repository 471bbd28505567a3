//! Page rasterization.
//!
//! Converts PDF pages to in-memory RGB bitmaps using the pure-Rust
//! `tiny-skia` library, and decodes embedded image XObjects to pixels.
//!
//! ## Pipeline
//!
//! 1. Decode the page content stream into operations
//! 2. Execute them against a graphics state stack
//! 3. Fill and stroke paths, show text, draw image and form XObjects,
//!    all under the current clip
//! 4. Draw the normal appearance of visible annotations
//! 5. Flatten the pixmap to an opaque RGB [`Bitmap`](crate::Bitmap)
//!
//! Glyphs are painted from their outlines so drawn checkbox characters
//! reach the detector like any other vector box.

mod fonts;
mod image_decode;
mod page_renderer;
mod path_rasterizer;
mod text_rasterizer;

pub use image_decode::{decode_image, DecodeFailure};
pub use page_renderer::{PageRenderer, RenderedPage};
pub use path_rasterizer::PathRasterizer;
pub use text_rasterizer::TextRasterizer;

use crate::error::Result;
use crate::parser::PdfBackend;
use std::sync::Arc;
use text_rasterizer::TextState;
use tiny_skia::{Color, LineCap, LineJoin, Mask, Paint, Transform};

/// Largest accepted pixmap side, in pixels.
pub const MAX_PIXMAP_SIDE: u32 = 20_000;

/// Options for page rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    /// Dots per inch (default: 72, one pixel per point)
    pub dpi: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { dpi: 72 }
    }
}

impl RasterOptions {
    /// Create options with custom DPI.
    pub fn with_dpi(dpi: u32) -> Self {
        Self { dpi }
    }

    /// Pixels per PDF point.
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Graphics state tracked while executing a content stream.
#[derive(Debug, Clone)]
pub(crate) struct GraphicsState {
    pub ctm: Transform,
    pub fill_rgb: (f32, f32, f32),
    pub stroke_rgb: (f32, f32, f32),
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    pub dash: (Vec<f32>, f32),
    pub text: TextState,
    /// Device-space clip; `None` paints the whole pixmap
    pub clip: Option<Arc<Mask>>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Transform::identity(),
            fill_rgb: (0.0, 0.0, 0.0),
            stroke_rgb: (0.0, 0.0, 0.0),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: (Vec::new(), 0.0),
            text: TextState::default(),
            clip: None,
        }
    }
}

/// Create a Paint configured for fill operations from graphics state.
pub(crate) fn create_fill_paint(gs: &GraphicsState) -> Paint<'static> {
    solid_paint(gs.fill_rgb)
}

/// Create a Paint configured for stroke operations from graphics state.
pub(crate) fn create_stroke_paint(gs: &GraphicsState) -> Paint<'static> {
    solid_paint(gs.stroke_rgb)
}

fn solid_paint((r, g, b): (f32, f32, f32)) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(
        Color::from_rgba(r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0), 1.0)
            .unwrap_or(Color::BLACK),
    );
    paint.anti_alias = true;
    paint
}

/// Convert CMYK to RGB.
pub(crate) fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> (f32, f32, f32) {
    (
        (1.0 - c) * (1.0 - k),
        (1.0 - m) * (1.0 - k),
        (1.0 - y) * (1.0 - k),
    )
}

/// Render one page of a document.
///
/// Convenience wrapper that builds a [`PageRenderer`] for a single call.
pub fn render_page<B: PdfBackend + ?Sized>(
    backend: &B,
    page_number: u32,
    options: &RasterOptions,
) -> Result<RenderedPage> {
    PageRenderer::new(*options).render_page(backend, page_number)
}
