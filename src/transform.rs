//! Screen-space ↔ export-space coordinate conversion.
//!
//! Drag gestures report positions in screen space: origin at the top-left of
//! the page container, y growing downward. The two export paths hand the
//! position to different renderers:
//!
//! * the preview renderer behind `submit` works in the same screen space, so
//!   coordinates pass through untouched;
//! * the re-embedding renderer behind `save` puts the origin at the
//!   bottom-left of the page, so y must be flipped against the page's
//!   on-screen height.
//!
//! The conversion is always chosen by [`CoordinateTarget`]; nothing here
//! knows which export path is calling.
//!
//! ## Subpixel grid
//!
//! Positions and page heights live on a grid of `1 / GRID_STEPS` px. Values
//! on that grid are exact binary fractions, so `h - (h - y) == y` holds
//! bit for bit and a flipped point always converts back to where it came
//! from.

use serde::{Deserialize, Serialize};

/// Subdivisions per screen pixel. A power of two.
pub const GRID_STEPS: f64 = 64.0;

/// Round `v` to the nearest grid step. NaN stays NaN.
pub fn snap(v: f64) -> f64 {
    (v * GRID_STEPS).round() / GRID_STEPS
}

/// Largest grid value not above `v`.
pub fn snap_down(v: f64) -> f64 {
    (v * GRID_STEPS).floor() / GRID_STEPS
}

/// A point in the page container's screen space (CSS pixels, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// This point moved onto the subpixel grid.
    pub fn snapped(self) -> Self {
        Self::new(snap(self.x), snap(self.y))
    }
}

/// A point expressed in the coordinate system of an export renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetPoint {
    pub x: f64,
    pub y: f64,
}

/// Coordinate convention of the renderer a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateTarget {
    /// Same origin and axis direction as the screen.
    Passthrough,
    /// Bottom-left origin: `y' = page_display_height - y`.
    VerticalFlip,
}

impl CoordinateTarget {
    /// Convert a screen point for this target.
    ///
    /// `page_display_height` must be the current on-screen height of the page
    /// the point belongs to; it is ignored by [`CoordinateTarget::Passthrough`].
    /// Both are snapped to the grid first.
    pub fn to_target(self, point: ScreenPoint, page_display_height: f64) -> TargetPoint {
        let point = point.snapped();
        match self {
            CoordinateTarget::Passthrough => TargetPoint {
                x: point.x,
                y: point.y,
            },
            CoordinateTarget::VerticalFlip => TargetPoint {
                x: point.x,
                y: snap(page_display_height) - point.y,
            },
        }
    }

    /// Inverse of [`CoordinateTarget::to_target`] for the same page height.
    pub fn from_target(self, point: TargetPoint, page_display_height: f64) -> ScreenPoint {
        let point = TargetPoint {
            x: snap(point.x),
            y: snap(point.y),
        };
        match self {
            CoordinateTarget::Passthrough => ScreenPoint {
                x: point.x,
                y: point.y,
            },
            CoordinateTarget::VerticalFlip => ScreenPoint {
                x: point.x,
                y: snap(page_display_height) - point.y,
            },
        }
    }
}
