//! Visual linker geometry
//!
//! Computes the filled connector drawn between a clicked bar and the row it
//! expanded. Pure geometry over axis-aligned rectangles in one coordinate
//! space; nothing here is stored, callers recompute on every resize or row
//! change.

use serde::{Deserialize, Serialize};

/// Vertical offset applied to the child edge so the fill does not overlap
/// the row border
pub const CHILD_EDGE_OFFSET: f64 = 2.0;

/// Axis-aligned rectangle, y grows downwards (DOMRect convention)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Express this rectangle relative to `origin`'s top-left corner
    pub fn relative_to(&self, origin: &Rect) -> Rect {
        Rect {
            left: self.left - origin.left,
            top: self.top - origin.top,
            right: self.right - origin.left,
            bottom: self.bottom - origin.top,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Corner and tangent coordinates of one connector
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Connector {
    pub start_left: f64,
    pub start_right: f64,
    pub start_y: f64,
    pub end_left: f64,
    pub end_right: f64,
    pub end_y: f64,
    /// Shared horizontal tangent line of both cubic segments
    pub mid_y: f64,
}

impl Connector {
    /// Connect the bottom edge of `parent` to the top edge of `child`
    pub fn between(parent: &Rect, child: &Rect) -> Self {
        let start_y = parent.bottom;
        let end_y = child.top + CHILD_EDGE_OFFSET;

        Self {
            start_left: parent.left,
            start_right: parent.right,
            start_y,
            end_left: child.left,
            end_right: child.right,
            end_y,
            mid_y: (start_y + end_y) / 2.0,
        }
    }

    /// Same as [`Connector::between`] after translating both rectangles into
    /// `container`'s coordinate space
    pub fn within(parent: &Rect, child: &Rect, container: &Rect) -> Self {
        Self::between(&parent.relative_to(container), &child.relative_to(container))
    }

    /// SVG path data: left curve down, straight across the child edge, right
    /// curve back up, closed
    pub fn svg_path(&self) -> String {
        format!(
            "M {sl},{sy} C {sl},{my} {el},{my} {el},{ey} L {er},{ey} C {er},{my} {sr},{my} {sr},{sy} Z",
            sl = self.start_left,
            sr = self.start_right,
            sy = self.start_y,
            el = self.end_left,
            er = self.end_right,
            ey = self.end_y,
            my = self.mid_y,
        )
    }
}

/// Scale `values` to sum to 1 for layout; the input is left untouched
///
/// A zero or non-finite sum (possible with mixed-sign effects) yields all
/// zeros rather than NaN widths.
pub fn normalize_values(values: &[f64]) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| v / sum).collect()
}
