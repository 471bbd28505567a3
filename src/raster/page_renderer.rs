//! Page renderer - converts PDF pages to RGB bitmaps.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::Bitmap;
use crate::parser::{
    get_number_from_value, ContentOp, EmbeddedImage, FormXObject, ObjectRef, PageGeometry,
    PdfBackend, PdfValue, ResourceScope, XObject, MAX_FORM_DEPTH,
};

use tiny_skia::{
    Color, FillRule, IntSize, PathBuilder, Pixmap, PixmapPaint, Point, Rect, Transform,
};

use super::fonts::LoadedFont;
use super::image_decode::decode_image;
use super::path_rasterizer::{pdf_line_cap_to_skia, pdf_line_join_to_skia, PathRasterizer, PathState};
use super::text_rasterizer::{TextRasterizer, TextState};
use super::{cmyk_to_rgb, GraphicsState, RasterOptions, MAX_PIXMAP_SIDE};

/// Everything the pipeline needs from one page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Text layer content (may be empty)
    pub text: String,
    /// Full-page raster, RGB
    pub bitmap: Bitmap,
    /// Embedded images in enumeration order
    pub images: Vec<EmbeddedImage>,
}

/// Page renderer that converts PDF pages to raster images.
#[derive(Debug, Default)]
pub struct PageRenderer {
    options: RasterOptions,
    path_rasterizer: PathRasterizer,
    text_rasterizer: TextRasterizer,
}

impl PageRenderer {
    /// Create a new page renderer with the given options.
    pub fn new(options: RasterOptions) -> Self {
        Self {
            options,
            path_rasterizer: PathRasterizer::new(),
            text_rasterizer: TextRasterizer::new(),
        }
    }

    /// Rasterization options in use.
    pub fn options(&self) -> &RasterOptions {
        &self.options
    }

    /// Extract text, raster and embedded images for a page.
    pub fn render_page<B: PdfBackend + ?Sized>(
        &self,
        backend: &B,
        page: u32,
    ) -> Result<RenderedPage> {
        let text = backend.page_text(page)?;
        let bitmap = self.rasterize(backend, page)?;
        let images = backend.page_images(page)?;

        Ok(RenderedPage {
            page_number: page,
            text,
            bitmap,
            images,
        })
    }

    /// Rasterize a page to an opaque RGB bitmap on a white background.
    ///
    /// Visible annotations are drawn over the page content from their
    /// normal appearance streams.
    pub fn rasterize<B: PdfBackend + ?Sized>(&self, backend: &B, page: u32) -> Result<Bitmap> {
        let geometry = backend.page_geometry(page)?;
        let scale = self.options.scale();
        let (display_w, display_h) = geometry.display_size();
        let width = (display_w * scale).ceil();
        let height = (display_h * scale).ceil();

        let max_side = MAX_PIXMAP_SIDE as f32;
        if !(width >= 1.0 && height >= 1.0 && width <= max_side && height <= max_side) {
            return Err(Error::page_render(
                page,
                format!("unusable pixmap size {}x{}", width, height),
            ));
        }

        let mut pixmap = Pixmap::new(width as u32, height as u32).ok_or_else(|| {
            Error::page_render(page, format!("failed to create pixmap {}x{}", width, height))
        })?;
        pixmap.fill(Color::WHITE);

        let content = backend.page_content(page)?;
        let operations = backend.decode_content(page, &content)?;
        let scope = backend.page_resources(page)?;
        let annotations = backend.page_annotations(page)?;

        let mut ctx = RenderContext {
            backend,
            page,
            pixmap: &mut pixmap,
            base: page_transform(&geometry, scale),
            fonts: HashMap::new(),
        };
        self.execute_operations(&mut ctx, &operations, &scope, GraphicsState::default(), 0)?;

        let no_resources = ResourceScope::default();
        for annotation in annotations.iter().filter(|a| a.is_visible()) {
            let Some(ref form) = annotation.appearance else {
                continue;
            };
            let Some(placement) = appearance_placement(annotation.rect, form) else {
                log::debug!(
                    "Page {}: {} annotation has a degenerate appearance box",
                    page,
                    annotation.subtype
                );
                continue;
            };
            let gs = GraphicsState {
                ctm: placement,
                ..GraphicsState::default()
            };
            self.run_form(&mut ctx, form, &no_resources, gs, 0)?;
        }

        let rgb: Vec<u8> = pixmap
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Bitmap::new(pixmap.width(), pixmap.height(), 3, rgb)
    }

    /// Execute content stream operations and render to the pixmap.
    fn execute_operations<B: PdfBackend + ?Sized>(
        &self,
        ctx: &mut RenderContext<'_, B>,
        operations: &[ContentOp],
        scope: &ResourceScope,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut gs = initial;
        let mut path = PathState::default();
        let mut pending_clip: Option<FillRule> = None;
        let mut tm = Transform::identity();
        let mut tlm = Transform::identity();

        for op in operations {
            let nums: Vec<f32> = op.operands.iter().filter_map(get_number_from_value).collect();

            match op.operator.as_str() {
                // Graphics state
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let [a, b, c, d, e, f] = nums[..] {
                        gs.ctm = gs.ctm.pre_concat(Transform::from_row(a, b, c, d, e, f));
                    }
                }
                "w" => {
                    if let [width] = nums[..] {
                        gs.line_width = width;
                    }
                }
                "J" => {
                    if let [cap] = nums[..] {
                        gs.line_cap = pdf_line_cap_to_skia(cap as i64);
                    }
                }
                "j" => {
                    if let [join] = nums[..] {
                        gs.line_join = pdf_line_join_to_skia(join as i64);
                    }
                }
                "M" => {
                    if let [limit] = nums[..] {
                        gs.miter_limit = limit;
                    }
                }
                "d" => {
                    if let Some(PdfValue::Array(array)) = op.operands.first() {
                        let intervals = array.iter().filter_map(get_number_from_value).collect();
                        let phase = op.operands.get(1).and_then(get_number_from_value);
                        gs.dash = (intervals, phase.unwrap_or(0.0));
                    }
                }
                "gs" => {
                    if let Some(PdfValue::Name(name)) = op.operands.first() {
                        if let Some(width) = scope.ext_gstate_line_width(name) {
                            gs.line_width = width;
                        }
                    }
                }

                // Color
                "g" => set_color(&mut gs.fill_rgb, &nums),
                "G" => set_color(&mut gs.stroke_rgb, &nums),
                "rg" => set_color(&mut gs.fill_rgb, &nums),
                "RG" => set_color(&mut gs.stroke_rgb, &nums),
                "k" => set_color(&mut gs.fill_rgb, &nums),
                "K" => set_color(&mut gs.stroke_rgb, &nums),
                "sc" | "scn" => set_color(&mut gs.fill_rgb, &nums),
                "SC" | "SCN" => set_color(&mut gs.stroke_rgb, &nums),
                "cs" => gs.fill_rgb = (0.0, 0.0, 0.0),
                "CS" => gs.stroke_rgb = (0.0, 0.0, 0.0),

                // Path construction
                "m" => {
                    if let [x, y] = nums[..] {
                        path.move_to(x, y);
                    }
                }
                "l" => {
                    if let [x, y] = nums[..] {
                        path.line_to(x, y);
                    }
                }
                "c" => {
                    if let [x1, y1, x2, y2, x3, y3] = nums[..] {
                        path.curve_to(x1, y1, x2, y2, x3, y3);
                    }
                }
                "v" => {
                    if let [x2, y2, x3, y3] = nums[..] {
                        path.curve_to_v(x2, y2, x3, y3);
                    }
                }
                "y" => {
                    if let [x1, y1, x3, y3] = nums[..] {
                        path.curve_to_y(x1, y1, x3, y3);
                    }
                }
                "h" => path.close(),
                "re" => {
                    if let [x, y, w, h] = nums[..] {
                        path.rect(x, y, w, h);
                    }
                }

                // Path painting
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    let operator = op.operator.as_str();
                    if matches!(operator, "s" | "b" | "b*") {
                        path.close();
                    }
                    let transform = ctx.base.pre_concat(gs.ctm);
                    let painted = path.take();
                    if let Some(ref p) = painted {
                        let fill_rule = if operator.ends_with('*') {
                            FillRule::EvenOdd
                        } else {
                            FillRule::Winding
                        };
                        if !matches!(operator, "S" | "s") {
                            self.path_rasterizer
                                .fill_path(ctx.pixmap, p, transform, &gs, fill_rule);
                        }
                        if !matches!(operator, "f" | "F" | "f*") {
                            self.path_rasterizer
                                .stroke_path(ctx.pixmap, p, transform, &gs);
                        }
                    }
                    if let Some(rule) = pending_clip.take() {
                        let size = ctx.size();
                        self.path_rasterizer
                            .clip(&mut gs, painted.as_ref(), transform, rule, size);
                    }
                }
                "n" => {
                    let ended = path.take();
                    if let Some(rule) = pending_clip.take() {
                        let transform = ctx.base.pre_concat(gs.ctm);
                        let size = ctx.size();
                        self.path_rasterizer
                            .clip(&mut gs, ended.as_ref(), transform, rule, size);
                    }
                }

                // Clipping, applied by the next painting operator
                "W" => pending_clip = Some(FillRule::Winding),
                "W*" => pending_clip = Some(FillRule::EvenOdd),

                // Text objects and state
                "BT" => {
                    tm = Transform::identity();
                    tlm = Transform::identity();
                }
                "Tc" => {
                    if let [spacing] = nums[..] {
                        gs.text.char_spacing = spacing;
                    }
                }
                "Tw" => {
                    if let [spacing] = nums[..] {
                        gs.text.word_spacing = spacing;
                    }
                }
                "Tz" => {
                    if let [scale] = nums[..] {
                        gs.text.horizontal_scale = scale / 100.0;
                    }
                }
                "TL" => {
                    if let [leading] = nums[..] {
                        gs.text.leading = leading;
                    }
                }
                "Ts" => {
                    if let [rise] = nums[..] {
                        gs.text.rise = rise;
                    }
                }
                "Tr" => {
                    if let [mode] = nums[..] {
                        gs.text.render_mode = (mode as i64).clamp(0, 7) as u8;
                    }
                }
                "Tf" => {
                    if let (Some(PdfValue::Name(name)), [size]) = (op.operands.first(), &nums[..]) {
                        gs.text.font = Some(name.clone());
                        gs.text.size = *size;
                    }
                }

                // Text positioning
                "Td" | "TD" => {
                    if let [tx, ty] = nums[..] {
                        if op.operator == "TD" {
                            gs.text.leading = -ty;
                        }
                        tlm = tlm.pre_concat(Transform::from_translate(tx, ty));
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let [a, b, c, d, e, f] = nums[..] {
                        tlm = Transform::from_row(a, b, c, d, e, f);
                        tm = tlm;
                    }
                }
                "T*" => next_line(&mut tm, &mut tlm, &gs.text),

                // Text showing
                "Tj" => {
                    if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                        self.show_text(ctx, scope, &gs, &mut tm, bytes, depth)?;
                    }
                }
                "'" => {
                    next_line(&mut tm, &mut tlm, &gs.text);
                    if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                        self.show_text(ctx, scope, &gs, &mut tm, bytes, depth)?;
                    }
                }
                "\"" => {
                    if let [aw, ac, ..] = nums[..] {
                        gs.text.word_spacing = aw;
                        gs.text.char_spacing = ac;
                    }
                    next_line(&mut tm, &mut tlm, &gs.text);
                    if let Some(PdfValue::Str(bytes)) = op.operands.last() {
                        self.show_text(ctx, scope, &gs, &mut tm, bytes, depth)?;
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                PdfValue::Str(bytes) => {
                                    self.show_text(ctx, scope, &gs, &mut tm, bytes, depth)?;
                                }
                                other => {
                                    if let Some(adjust) = get_number_from_value(other) {
                                        let tx = -adjust / 1000.0
                                            * gs.text.size
                                            * gs.text.horizontal_scale;
                                        tm = tm.pre_concat(Transform::from_translate(tx, 0.0));
                                    }
                                }
                            }
                        }
                    }
                }

                // XObjects
                "Do" => {
                    if let Some(PdfValue::Name(name)) = op.operands.first() {
                        self.render_xobject(ctx, name, scope, &gs, depth)?;
                    }
                }

                // Shading, inline images and marked content are not drawn.
                _ => {}
            }
        }

        Ok(())
    }

    /// Render an XObject (image or form).
    ///
    /// A name missing from the resources is skipped, but a resource that
    /// points at an unreadable object fails the page.
    fn render_xobject<B: PdfBackend + ?Sized>(
        &self,
        ctx: &mut RenderContext<'_, B>,
        name: &[u8],
        scope: &ResourceScope,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let Some(id) = scope.xobject(name) else {
            log::debug!(
                "Page {}: unknown XObject /{}",
                ctx.page,
                String::from_utf8_lossy(name)
            );
            return Ok(());
        };

        match ctx.backend.xobject(ctx.page, id)? {
            XObject::Image(image) => {
                let transform = ctx.base.pre_concat(gs.ctm);
                draw_image(ctx.pixmap, &image, transform, gs, ctx.page);
            }
            XObject::Form(form) => self.run_form(ctx, &form, scope, gs.clone(), depth)?,
            XObject::Other => {}
        }
        Ok(())
    }

    /// Execute a form XObject or appearance stream, clipped to its bounding box.
    fn run_form<B: PdfBackend + ?Sized>(
        &self,
        ctx: &mut RenderContext<'_, B>,
        form: &FormXObject,
        scope: &ResourceScope,
        mut gs: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        if depth >= MAX_FORM_DEPTH {
            log::debug!("Page {}: form XObject nesting too deep", ctx.page);
            return Ok(());
        }

        let [a, b, c, d, e, f] = form.matrix;
        gs.ctm = gs.ctm.pre_concat(Transform::from_row(a, b, c, d, e, f));
        if let Some([x0, y0, x1, y1]) = form.bbox {
            let bbox = Rect::from_ltrb(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
                .map(PathBuilder::from_rect);
            let transform = ctx.base.pre_concat(gs.ctm);
            let size = ctx.size();
            self.path_rasterizer
                .clip(&mut gs, bbox.as_ref(), transform, FillRule::Winding, size);
        }

        let operations = ctx.backend.decode_content(ctx.page, &form.content)?;
        let inner_scope = form.resources.as_ref().unwrap_or(scope);
        self.execute_operations(ctx, &operations, inner_scope, gs, depth + 1)
    }

    /// Paint a string with the current font and advance the text matrix.
    ///
    /// Without a usable font nothing is painted and the position stays put.
    fn show_text<B: PdfBackend + ?Sized>(
        &self,
        ctx: &mut RenderContext<'_, B>,
        scope: &ResourceScope,
        gs: &GraphicsState,
        tm: &mut Transform,
        bytes: &[u8],
        depth: usize,
    ) -> Result<()> {
        let Some(font) = self.font(ctx, scope, &gs.text) else {
            return Ok(());
        };
        let outlines = font.outlines();
        let user_to_device = ctx.base.pre_concat(gs.ctm);
        let text = &gs.text;

        for code in font.codes(bytes) {
            if let Some((matrix, resources)) = font.type3_space() {
                let procedure = font.type3_proc(code);
                if let (Some(procedure), false) = (procedure, text.is_invisible()) {
                    if depth < MAX_FORM_DEPTH {
                        let glyph_to_user = gs.ctm.pre_concat(*tm).pre_concat(text.glyph_space());
                        let glyph = GraphicsState {
                            ctm: glyph_to_user.pre_concat(matrix),
                            text: TextState::default(),
                            ..gs.clone()
                        };
                        match ctx.backend.decode_content(ctx.page, procedure) {
                            Ok(ops) => {
                                let glyph_scope = resources.unwrap_or(scope);
                                self.execute_operations(ctx, &ops, glyph_scope, glyph, depth + 1)?;
                            }
                            Err(e) => {
                                log::debug!("Page {}: skipping Type3 glyph {}: {}", ctx.page, code, e)
                            }
                        }
                    }
                }
            } else if let Some(ref outlines) = outlines {
                if let Some(outline) = font.glyph_outline(outlines, code) {
                    let glyph_to_device = user_to_device
                        .pre_concat(*tm)
                        .pre_concat(text.glyph_space())
                        .pre_concat(outlines.units());
                    self.text_rasterizer.draw_glyph(
                        ctx.pixmap,
                        &outline,
                        glyph_to_device,
                        user_to_device,
                        gs,
                    );
                }
            }

            let mut tx = font.advance(code, outlines.as_ref()) * text.size + text.char_spacing;
            if font.is_word_space(code) {
                tx += text.word_spacing;
            }
            *tm = tm.pre_concat(Transform::from_translate(tx * text.horizontal_scale, 0.0));
        }
        Ok(())
    }

    /// Resolve the font selected by `Tf`, once per object for the page.
    fn font<B: PdfBackend + ?Sized>(
        &self,
        ctx: &mut RenderContext<'_, B>,
        scope: &ResourceScope,
        text: &TextState,
    ) -> Option<Arc<LoadedFont>> {
        let name = text.font.as_deref()?;
        let Some(id) = scope.font(name) else {
            log::debug!(
                "Page {}: unknown font /{}",
                ctx.page,
                String::from_utf8_lossy(name)
            );
            return None;
        };
        if let Some(cached) = ctx.fonts.get(&id) {
            return cached.clone();
        }

        let loaded = match ctx.backend.font(ctx.page, id) {
            Ok(resource) => Some(Arc::new(LoadedFont::new(resource))),
            Err(e) => {
                log::debug!("Page {}: text in font {:?} is not drawn: {}", ctx.page, id, e);
                None
            }
        };
        ctx.fonts.insert(id, loaded.clone());
        loaded
    }
}

struct RenderContext<'a, B: PdfBackend + ?Sized> {
    backend: &'a B,
    page: u32,
    pixmap: &'a mut Pixmap,
    base: Transform,
    fonts: HashMap<ObjectRef, Option<Arc<LoadedFont>>>,
}

impl<B: PdfBackend + ?Sized> RenderContext<'_, B> {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }
}

/// `T*`: move to the start of the next line.
fn next_line(tm: &mut Transform, tlm: &mut Transform, text: &TextState) {
    *tlm = tlm.pre_concat(Transform::from_translate(0.0, -text.leading));
    *tm = *tlm;
}

/// Map an appearance stream onto its annotation rectangle.
///
/// The form's bounding box, after its own matrix, is scaled and moved to
/// fill `rect`. The returned transform goes before the form matrix.
fn appearance_placement(rect: [f32; 4], form: &FormXObject) -> Option<Transform> {
    let [x0, y0, x1, y1] = form.bbox?;
    let [a, b, c, d, e, f] = form.matrix;
    let mut corners = [
        Point::from_xy(x0, y0),
        Point::from_xy(x1, y0),
        Point::from_xy(x1, y1),
        Point::from_xy(x0, y1),
    ];
    Transform::from_row(a, b, c, d, e, f).map_points(&mut corners);

    let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = corners.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let (width, height) = (max_x - min_x, max_y - min_y);
    if !(width > 0.0 && height > 0.0) {
        return None;
    }

    let [r0, r1, r2, r3] = rect;
    let (left, bottom) = (r0.min(r2), r1.min(r3));
    let sx = (r0.max(r2) - left) / width;
    let sy = (r1.max(r3) - bottom) / height;
    Some(Transform::from_row(
        sx,
        0.0,
        0.0,
        sy,
        left - min_x * sx,
        bottom - min_y * sy,
    ))
}

/// PDF user space to pixel space: Y flip, box origin offset and rotation.
fn page_transform(geometry: &PageGeometry, scale: f32) -> Transform {
    let s = scale;
    let PageGeometry {
        x: x0,
        y: y0,
        width: w,
        height: h,
        ..
    } = *geometry;

    match geometry.rotation {
        90 => Transform::from_row(0.0, s, s, 0.0, -s * y0, -s * x0),
        180 => Transform::from_row(-s, 0.0, 0.0, s, s * (w + x0), -s * y0),
        270 => Transform::from_row(0.0, -s, -s, 0.0, s * (y0 + h), s * (w + x0)),
        _ => Transform::from_row(s, 0.0, 0.0, -s, -s * x0, s * (y0 + h)),
    }
}

/// Set a color from gray, RGB or CMYK components, chosen by count.
fn set_color(target: &mut (f32, f32, f32), components: &[f32]) {
    match *components {
        [g] => *target = (g, g, g),
        [r, g, b] => *target = (r, g, b),
        [c, m, y, k] => *target = cmyk_to_rgb(c, m, y, k),
        _ => {}
    }
}

/// Draw an image through the unit square of the current transform.
fn draw_image(
    pixmap: &mut Pixmap,
    image: &EmbeddedImage,
    transform: Transform,
    gs: &GraphicsState,
    page: u32,
) {
    let bitmap = match decode_image(image) {
        Ok(bitmap) => bitmap,
        Err(e) => {
            log::debug!(
                "Page {}: not drawing image {:?}: {}",
                page,
                image.object_id,
                e
            );
            return;
        }
    };

    let stencil = image.image_mask.then_some(gs.fill_rgb);
    let Some(source) = bitmap_to_pixmap(&bitmap, stencil) else {
        return;
    };

    let (w, h) = (bitmap.width() as f32, bitmap.height() as f32);
    let unit = Transform::from_row(1.0 / w, 0.0, 0.0, -1.0 / h, 0.0, 1.0);
    pixmap.draw_pixmap(
        0,
        0,
        source.as_ref(),
        &PixmapPaint::default(),
        transform.pre_concat(unit),
        gs.clip.as_deref(),
    );
}

/// Convert a decoded image to a premultiplied RGBA pixmap.
///
/// Stencil masks paint the fill color where the sample is 0 and leave
/// other pixels transparent.
fn bitmap_to_pixmap(bitmap: &Bitmap, stencil: Option<(f32, f32, f32)>) -> Option<Pixmap> {
    let size = IntSize::from_wh(bitmap.width(), bitmap.height())?;
    let channels = bitmap.channels() as usize;
    let mut rgba = Vec::with_capacity(bitmap.width() as usize * bitmap.height() as usize * 4);

    for px in bitmap.data().chunks_exact(channels) {
        let pixel = match (stencil, channels) {
            (Some((r, g, b)), _) => {
                if px[0] == 0 {
                    [to_u8(r), to_u8(g), to_u8(b), 255]
                } else {
                    [0, 0, 0, 0]
                }
            }
            (None, 1) => [px[0], px[0], px[0], 255],
            (None, 2) => {
                let v = premultiply(px[0], px[1]);
                [v, v, v, px[1]]
            }
            (None, 3) => [px[0], px[1], px[2], 255],
            (None, 4) => [
                premultiply(px[0], px[3]),
                premultiply(px[1], px[3]),
                premultiply(px[2], px[3]),
                px[3],
            ],
            _ => return None,
        };
        rgba.extend_from_slice(&pixel);
    }

    Pixmap::from_vec(rgba, size)
}

fn to_u8(component: f32) -> u8 {
    (component.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn premultiply(value: u8, alpha: u8) -> u8 {
    ((value as u16 * alpha as u16 + 127) / 255) as u8
}
