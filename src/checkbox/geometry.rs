//! Checkbox size and shape window.

/// Geometry a bounding box must satisfy to count as a checkbox.
///
/// The default is the fixed heuristic: sides between 10 and 30 pixels
/// inclusive, width/height ratio between 0.8 and 1.2 inclusive, pixels
/// darker than 200 treated as ink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckboxGeometry {
    /// Smallest accepted side, in pixels
    pub min_side: f64,
    /// Largest accepted side, in pixels
    pub max_side: f64,
    /// Smallest accepted width/height ratio
    pub min_aspect: f64,
    /// Largest accepted width/height ratio
    pub max_aspect: f64,
    /// Gray level at or above which a pixel is background
    pub threshold: u8,
}

impl Default for CheckboxGeometry {
    fn default() -> Self {
        Self {
            min_side: 10.0,
            max_side: 30.0,
            min_aspect: 0.8,
            max_aspect: 1.2,
            threshold: 200,
        }
    }
}

impl CheckboxGeometry {
    /// Create the default geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accepted side range.
    pub fn with_sides(mut self, min: f64, max: f64) -> Self {
        self.min_side = min;
        self.max_side = max;
        self
    }

    /// Set the accepted aspect ratio range.
    pub fn with_aspect(mut self, min: f64, max: f64) -> Self {
        self.min_aspect = min;
        self.max_aspect = max;
        self
    }

    /// Set the binarization threshold.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    /// Check whether a `width` x `height` box is checkbox-shaped.
    pub fn matches(&self, width: f64, height: f64) -> bool {
        if height <= 0.0 || width <= 0.0 {
            return false;
        }
        let aspect = width / height;
        (self.min_aspect..=self.max_aspect).contains(&aspect)
            && (self.min_side..=self.max_side).contains(&width)
            && (self.min_side..=self.max_side).contains(&height)
    }
}
