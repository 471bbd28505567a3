//! Path construction and painting with tiny-skia.

use std::sync::Arc;

use super::{create_fill_paint, create_stroke_paint, GraphicsState};
use tiny_skia::{
    FillRule, LineCap, LineJoin, Mask, Path, PathBuilder, Pixmap, Stroke, StrokeDash, Transform,
};

/// Current path under construction, in user space.
///
/// Tracks the current point so `v` curves and rectangles behave as in PDF.
#[derive(Default)]
pub(crate) struct PathState {
    builder: PathBuilder,
    current: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
}

impl PathState {
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
        self.current = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        if self.current.is_none() {
            self.move_to(x, y);
            return;
        }
        self.builder.line_to(x, y);
        self.current = Some((x, y));
    }

    pub fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32) {
        if self.current.is_none() {
            self.move_to(x1, y1);
        }
        self.builder.cubic_to(x1, y1, x2, y2, x3, y3);
        self.current = Some((x3, y3));
    }

    /// `v`: first control point is the current point.
    pub fn curve_to_v(&mut self, x2: f32, y2: f32, x3: f32, y3: f32) {
        let (x1, y1) = self.current.unwrap_or((x2, y2));
        self.curve_to(x1, y1, x2, y2, x3, y3);
    }

    /// `y`: second control point is the end point.
    pub fn curve_to_y(&mut self, x1: f32, y1: f32, x3: f32, y3: f32) {
        self.curve_to(x1, y1, x3, y3, x3, y3);
    }

    pub fn close(&mut self) {
        if self.current.is_some() {
            self.builder.close();
            self.current = self.subpath_start;
        }
    }

    /// `re`: a closed subpath, valid for negative width or height.
    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close();
    }

    /// Finish the path and reset for the next one.
    pub fn take(&mut self) -> Option<Path> {
        let state = std::mem::take(self);
        state.builder.finish()
    }
}

/// Rasterizer for PDF path painting operations.
#[derive(Debug, Default)]
pub struct PathRasterizer;

impl PathRasterizer {
    /// Create a new path rasterizer.
    pub fn new() -> Self {
        Self
    }

    /// Fill a path with the current fill color.
    pub(crate) fn fill_path(
        &self,
        pixmap: &mut Pixmap,
        path: &Path,
        transform: Transform,
        gs: &GraphicsState,
        fill_rule: FillRule,
    ) {
        let paint = create_fill_paint(gs);
        pixmap.fill_path(path, &paint, fill_rule, transform, gs.clip.as_deref());
    }

    /// Stroke a path with the current stroke color and line style.
    pub(crate) fn stroke_path(
        &self,
        pixmap: &mut Pixmap,
        path: &Path,
        transform: Transform,
        gs: &GraphicsState,
    ) {
        let paint = create_stroke_paint(gs);
        let stroke = Stroke {
            width: gs.line_width.max(0.0),
            line_cap: gs.line_cap,
            line_join: gs.line_join,
            miter_limit: gs.miter_limit.max(1.0),
            dash: dash_pattern(&gs.dash.0, gs.dash.1),
        };
        pixmap.stroke_path(path, &paint, &stroke, transform, gs.clip.as_deref());
    }

    /// Intersect the clip of `gs` with a path. `None` clips everything away.
    pub(crate) fn clip(
        &self,
        gs: &mut GraphicsState,
        path: Option<&Path>,
        transform: Transform,
        fill_rule: FillRule,
        (width, height): (u32, u32),
    ) {
        let mask = match gs.clip.take() {
            Some(current) => {
                let mut mask = Arc::try_unwrap(current).unwrap_or_else(|shared| (*shared).clone());
                match path {
                    Some(path) => mask.intersect_path(path, fill_rule, true, transform),
                    None => mask.clear(),
                }
                Some(mask)
            }
            None => Mask::new(width, height).map(|mut mask| {
                if let Some(path) = path {
                    mask.fill_path(path, fill_rule, true, transform);
                }
                mask
            }),
        };
        gs.clip = mask.map(Arc::new);
    }
}

/// Build a tiny-skia dash from a PDF dash array.
///
/// PDF repeats odd-length arrays; an empty or all-zero array is solid.
fn dash_pattern(array: &[f32], phase: f32) -> Option<StrokeDash> {
    if array.is_empty() || array.iter().all(|d| *d <= 0.0) {
        return None;
    }
    let mut intervals = array.to_vec();
    if intervals.len() % 2 == 1 {
        intervals.extend_from_slice(array);
    }
    StrokeDash::new(intervals, phase)
}

/// Convert PDF line cap style to tiny-skia.
pub(crate) fn pdf_line_cap_to_skia(cap: i64) -> LineCap {
    match cap {
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => LineCap::Butt,
    }
}

/// Convert PDF line join style to tiny-skia.
pub(crate) fn pdf_line_join_to_skia(join: i64) -> LineJoin {
    match join {
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => LineJoin::Miter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_cap_conversion() {
        assert_eq!(pdf_line_cap_to_skia(0), LineCap::Butt);
        assert_eq!(pdf_line_cap_to_skia(1), LineCap::Round);
        assert_eq!(pdf_line_cap_to_skia(2), LineCap::Square);
        assert_eq!(pdf_line_cap_to_skia(99), LineCap::Butt);
    }

    #[test]
    fn test_line_join_conversion() {
        assert_eq!(pdf_line_join_to_skia(0), LineJoin::Miter);
        assert_eq!(pdf_line_join_to_skia(1), LineJoin::Round);
        assert_eq!(pdf_line_join_to_skia(2), LineJoin::Bevel);
    }

    #[test]
    fn test_dash_pattern() {
        assert!(dash_pattern(&[], 0.0).is_none());
        assert!(dash_pattern(&[0.0], 0.0).is_none());
        assert!(dash_pattern(&[3.0], 0.0).is_some());
        assert!(dash_pattern(&[3.0, 2.0], 1.0).is_some());
    }

    #[test]
    fn test_negative_rect_builds_path() {
        let mut state = PathState::default();
        state.rect(30.0, 30.0, -20.0, -20.0);
        let path = state.take().unwrap();
        let bounds = path.bounds();
        assert_eq!((bounds.left(), bounds.top()), (10.0, 10.0));
        assert_eq!((bounds.width(), bounds.height()), (20.0, 20.0));
        assert!(state.take().is_none());
    }

    #[test]
    fn test_fill_paints_pixels() {
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);

        let mut state = PathState::default();
        state.rect(5.0, 5.0, 10.0, 10.0);
        let path = state.take().unwrap();

        let gs = GraphicsState::default();
        PathRasterizer::new().fill_path(
            &mut pixmap,
            &path,
            Transform::identity(),
            &gs,
            FillRule::Winding,
        );

        let inside = pixmap.pixel(10, 10).unwrap();
        assert_eq!((inside.red(), inside.green(), inside.blue()), (0, 0, 0));
        let outside = pixmap.pixel(1, 1).unwrap();
        assert_eq!(outside.red(), 255);
    }

    #[test]
    fn test_clip_limits_painting() {
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);
        let rasterizer = PathRasterizer::new();

        let mut clip = PathState::default();
        clip.rect(0.0, 0.0, 10.0, 20.0);
        let clip = clip.take().unwrap();

        let mut gs = GraphicsState::default();
        rasterizer.clip(&mut gs, Some(&clip), Transform::identity(), FillRule::Winding, (20, 20));

        let mut fill = PathState::default();
        fill.rect(0.0, 0.0, 20.0, 20.0);
        let fill = fill.take().unwrap();
        rasterizer.fill_path(&mut pixmap, &fill, Transform::identity(), &gs, FillRule::Winding);

        assert_eq!(pixmap.pixel(5, 5).unwrap().red(), 0);
        assert_eq!(pixmap.pixel(15, 5).unwrap().red(), 255);
    }

    #[test]
    fn test_clips_intersect() {
        let rasterizer = PathRasterizer::new();
        let mut gs = GraphicsState::default();

        let mut left = PathState::default();
        left.rect(0.0, 0.0, 10.0, 20.0);
        let mut top = PathState::default();
        top.rect(0.0, 0.0, 20.0, 10.0);
        let (left, top) = (left.take().unwrap(), top.take().unwrap());

        rasterizer.clip(&mut gs, Some(&left), Transform::identity(), FillRule::Winding, (20, 20));
        let outer = gs.clone();
        rasterizer.clip(&mut gs, Some(&top), Transform::identity(), FillRule::Winding, (20, 20));

        let mask = gs.clip.as_deref().unwrap();
        assert_eq!(mask.data()[5 * 20 + 5], 255);
        assert_eq!(mask.data()[15 * 20 + 5], 0);
        assert_eq!(mask.data()[5 * 20 + 15], 0);

        // The saved state keeps its own clip.
        let saved = outer.clip.as_deref().unwrap();
        assert_eq!(saved.data()[15 * 20 + 5], 255);

        rasterizer.clip(&mut gs, None, Transform::identity(), FillRule::Winding, (20, 20));
        assert!(gs.clip.as_deref().unwrap().data().iter().all(|v| *v == 0));
    }
}
