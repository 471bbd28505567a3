//! Text state and glyph painting.

use tiny_skia::{FillRule, Path, Pixmap, Transform};

use super::path_rasterizer::PathRasterizer;
use super::GraphicsState;

/// Text parameters set by `Tc`, `Tw`, `Tz`, `TL`, `Tf`, `Tr` and `Ts`.
#[derive(Debug, Clone)]
pub(crate) struct TextState {
    /// Font resource name
    pub font: Option<Vec<u8>>,
    pub size: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    /// `Tz` / 100
    pub horizontal_scale: f32,
    pub leading: f32,
    pub rise: f32,
    pub render_mode: u8,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

impl TextState {
    /// Text space of a 1-unit glyph to text matrix space.
    pub fn glyph_space(&self) -> Transform {
        Transform::from_row(
            self.size * self.horizontal_scale,
            0.0,
            0.0,
            self.size,
            0.0,
            self.rise,
        )
    }

    fn fills(&self) -> bool {
        matches!(self.render_mode, 0 | 2 | 4 | 6)
    }

    fn strokes(&self) -> bool {
        matches!(self.render_mode, 1 | 2 | 5 | 6)
    }

    /// Modes 3 and 7 paint nothing.
    pub fn is_invisible(&self) -> bool {
        !self.fills() && !self.strokes()
    }
}

/// Paints glyph outlines with the fill and stroke of the graphics state.
#[derive(Debug, Default)]
pub struct TextRasterizer {
    paths: PathRasterizer,
}

impl TextRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paint one glyph outline given in font units.
    ///
    /// `glyph_to_device` maps font units to pixels. Strokes use the line
    /// width in user space, so they are drawn through `user_to_device`.
    pub(crate) fn draw_glyph(
        &self,
        pixmap: &mut Pixmap,
        outline: &Path,
        glyph_to_device: Transform,
        user_to_device: Transform,
        gs: &GraphicsState,
    ) {
        if gs.text.size == 0.0 || gs.text.is_invisible() {
            return;
        }

        if gs.text.fills() {
            self.paths
                .fill_path(pixmap, outline, glyph_to_device, gs, FillRule::Winding);
        }

        if gs.text.strokes() {
            let Some(to_user) = user_to_device.invert() else {
                return;
            };
            let glyph_to_user = to_user.pre_concat(glyph_to_device);
            if let Some(user_path) = outline.clone().transform(glyph_to_user) {
                self.paths.stroke_path(pixmap, &user_path, user_to_device, gs);
            }
        }
    }
}
