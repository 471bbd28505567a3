//! Bar chart of checkbox counts per page.
//!
//! Drawn with `tiny-skia` and encoded as PNG. The chart carries no text:
//! one bar per page, left to right in page order, over a zero-based
//! vertical axis with a tick for every step.

use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::error::{Error, Result};

/// Chart layout and colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartOptions {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Space around the plot area, in pixels
    pub margin: f32,
    /// Fraction of each page slot covered by its bar
    pub bar_fill: f32,
    pub bar_color: [u8; 3],
    pub axis_color: [u8; 3],
    pub background: [u8; 3],
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            margin: 40.0,
            bar_fill: 0.7,
            bar_color: [70, 130, 180],
            axis_color: [0, 0, 0],
            background: [255, 255, 255],
        }
    }
}

impl ChartOptions {
    /// Set the image size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Render per-page checkbox counts as a PNG bar chart.
pub fn render_chart(counts: &[u32], options: &ChartOptions) -> Result<Vec<u8>> {
    let pixmap = draw_chart(counts, options)?;
    pixmap
        .encode_png()
        .map_err(|e| Error::Render(format!("PNG encoding failed: {}", e)))
}

fn draw_chart(counts: &[u32], options: &ChartOptions) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(options.width, options.height).ok_or_else(|| {
        Error::Render(format!(
            "invalid chart size {}x{}",
            options.width, options.height
        ))
    })?;
    pixmap.fill(color(options.background));

    let margin = options.margin;
    let plot_w = options.width as f32 - 2.0 * margin;
    let plot_h = options.height as f32 - 2.0 * margin;
    if plot_w <= 0.0 || plot_h <= 0.0 {
        return Err(Error::Render("chart margin leaves no plot area".to_string()));
    }
    let (left, bottom) = (margin, margin + plot_h);

    let max = counts.iter().copied().max().unwrap_or(0).max(1);
    let step = tick_step(max);
    let y_of = |value: f32| bottom - value / max as f32 * plot_h;

    // Bars
    let mut bar = paint(options.bar_color);
    bar.anti_alias = false;
    if !counts.is_empty() {
        let slot = plot_w / counts.len() as f32;
        let bar_w = (slot * options.bar_fill).max(1.0);
        for (i, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let x = left + slot * i as f32 + (slot - bar_w) / 2.0;
            let top = y_of(count as f32);
            if let Some(rect) = Rect::from_ltrb(x, top, x + bar_w, bottom) {
                pixmap.fill_rect(rect, &bar, Transform::identity(), None);
            }
        }
    }

    // Axes and ticks
    let mut axes = PathBuilder::new();
    axes.move_to(left, margin);
    axes.line_to(left, bottom);
    axes.line_to(left + plot_w, bottom);

    let mut value = 0;
    while value <= max {
        let y = y_of(value as f32);
        axes.move_to(left - 5.0, y);
        axes.line_to(left, y);
        value += step;
    }
    if !counts.is_empty() {
        let slot = plot_w / counts.len() as f32;
        for i in 0..counts.len() {
            let x = left + slot * (i as f32 + 0.5);
            axes.move_to(x, bottom);
            axes.line_to(x, bottom + 5.0);
        }
    }

    if let Some(path) = axes.finish() {
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        pixmap.stroke_path(
            &path,
            &paint(options.axis_color),
            &stroke,
            Transform::identity(),
            None,
        );
    }

    Ok(pixmap)
}

/// Tick spacing giving at most about ten ticks.
fn tick_step(max: u32) -> u32 {
    let rough = (max + 9) / 10;
    let mut step = 1;
    loop {
        for factor in [1, 2, 5] {
            if step * factor >= rough {
                return step * factor;
            }
        }
        step *= 10;
    }
}

fn color([r, g, b]: [u8; 3]) -> Color {
    Color::from_rgba8(r, g, b, 255)
}

fn paint(rgb: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color(rgb));
    paint
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Count runs of bar-colored pixels along a row just above the x axis.
    fn bars_on_baseline(pixmap: &Pixmap, options: &ChartOptions) -> usize {
        let y = (options.height as f32 - options.margin - 2.0) as u32;
        let [r, g, b] = options.bar_color;
        let mut runs = 0;
        let mut inside = false;
        for x in 0..pixmap.width() {
            let px = pixmap.pixel(x, y).unwrap();
            let is_bar = (px.red(), px.green(), px.blue()) == (r, g, b);
            if is_bar && !inside {
                runs += 1;
            }
            inside = is_bar;
        }
        runs
    }

    #[test]
    fn test_one_bar_per_page() {
        let options = ChartOptions::default();
        let pixmap = draw_chart(&[2, 5, 1, 4], &options).unwrap();
        assert_eq!(bars_on_baseline(&pixmap, &options), 4);
    }

    #[test]
    fn test_bar_heights_follow_counts() {
        let options = ChartOptions::default();
        let pixmap = draw_chart(&[1, 4], &options).unwrap();
        let [r, g, b] = options.bar_color;
        let height_at = |x: u32| {
            (0..pixmap.height())
                .filter(|&y| {
                    let px = pixmap.pixel(x, y).unwrap();
                    (px.red(), px.green(), px.blue()) == (r, g, b)
                })
                .count()
        };
        // Slot centres: one quarter and three quarters of the plot width.
        let plot_w = options.width as f32 - 2.0 * options.margin;
        let first = height_at((options.margin + plot_w * 0.25 + 3.0) as u32);
        let second = height_at((options.margin + plot_w * 0.75 + 3.0) as u32);
        assert!(second > first * 3, "{} vs {}", first, second);
    }

    #[test]
    fn test_empty_and_zero_counts() {
        let options = ChartOptions::default();
        assert_eq!(bars_on_baseline(&draw_chart(&[], &options).unwrap(), &options), 0);
        assert_eq!(bars_on_baseline(&draw_chart(&[0, 0], &options).unwrap(), &options), 0);
    }

    #[test]
    fn test_png_output() {
        let png = render_chart(&[3, 0, 7], &ChartOptions::default()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 480));
    }

    #[test]
    fn test_invalid_size() {
        let options = ChartOptions::default().with_size(0, 100);
        assert!(matches!(render_chart(&[1], &options), Err(Error::Render(_))));
        let options = ChartOptions::default().with_size(50, 50);
        assert!(matches!(render_chart(&[1], &options), Err(Error::Render(_))));
    }

    #[test]
    fn test_tick_step() {
        assert_eq!(tick_step(1), 1);
        assert_eq!(tick_step(10), 1);
        assert_eq!(tick_step(11), 2);
        assert_eq!(tick_step(45), 5);
        assert_eq!(tick_step(300), 50);
    }
}
