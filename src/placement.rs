//! Draggable overlay position and commit state.
//!
//! A drag is a two-phase protocol: any number of [`PlacementController::on_drag_move`]
//! calls followed by exactly one [`PlacementController::on_drag_release`].
//! Only the release commits. Moves are advisory: they update the live
//! position and withdraw any earlier commit, so the overlay can never be
//! shown at a position the user has not let go of.
//!
//! Positions are clamped to the bounds of the page the overlay lives on
//! (the overlay's own extent included). Dragging past an edge pins the
//! overlay to that edge; it is never an error. Every stored position sits
//! on the subpixel grid of [`crate::transform`].

use crate::transform::{snap, snap_down, ScreenPoint};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Position a freshly reset overlay starts at.
pub const DEFAULT_POSITION: ScreenPoint = ScreenPoint::new(100.0, 100.0);

/// Width/height pair in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Where the signature sits and whether the user has let go of it there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: ScreenPoint,
    pub page_index: usize,
    pub committed: bool,
}

/// Owns the overlay position for one editing session.
#[derive(Debug, Clone)]
pub struct PlacementController {
    placement: Placement,
    default_position: ScreenPoint,
    bounds: Option<Extent>,
    overlay: Extent,
    dragging: bool,
}

impl PlacementController {
    pub fn new(default_position: ScreenPoint, page_index: usize) -> Self {
        Self {
            placement: Placement {
                position: default_position,
                page_index,
                committed: false,
            },
            default_position,
            bounds: None,
            overlay: Extent::default(),
            dragging: false,
        }
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn position(&self) -> ScreenPoint {
        self.placement.position
    }

    pub fn page_index(&self) -> usize {
        self.placement.page_index
    }

    pub fn is_committed(&self) -> bool {
        self.placement.committed
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Live position while a gesture is in progress.
    pub fn drag_preview(&self) -> Option<ScreenPoint> {
        self.dragging.then_some(self.placement.position)
    }

    /// Set the container box positions are clamped to. `None` disables
    /// clamping (no page laid out yet).
    pub fn set_bounds(&mut self, bounds: Option<Extent>) {
        self.bounds = bounds;
        self.placement.position = self.clamp(self.placement.position);
    }

    pub fn bounds(&self) -> Option<Extent> {
        self.bounds
    }

    /// Size of the rendered overlay, as measured by the host.
    pub fn set_overlay_extent(&mut self, extent: Extent) {
        self.overlay = Extent::new(extent.width.max(0.0), extent.height.max(0.0));
        self.placement.position = self.clamp(self.placement.position);
    }

    /// Apply one intermediate drag frame. Uncommits.
    pub fn on_drag_move(&mut self, dx: f64, dy: f64) {
        let p = self.placement.position;
        self.placement.position = self.clamp(ScreenPoint::new(p.x + dx, p.y + dy));
        self.placement.committed = false;
        self.dragging = true;
    }

    /// Finish the gesture at `(x, y)` and commit. Returns the clamped position.
    pub fn on_drag_release(&mut self, x: f64, y: f64) -> ScreenPoint {
        let position = self.clamp(ScreenPoint::new(x, y));
        self.placement.position = position;
        self.placement.committed = true;
        self.dragging = false;
        debug!(x = position.x, y = position.y, "placement committed");
        position
    }

    /// Drop an unfinished gesture. The position stays where the last move
    /// left it, uncommitted.
    pub fn cancel_drag(&mut self) {
        self.dragging = false;
    }

    /// Withdraw the commit without moving the overlay.
    pub fn invalidate(&mut self) {
        self.placement.committed = false;
    }

    pub fn set_page_index(&mut self, page_index: usize) {
        self.placement.page_index = page_index;
        self.placement.committed = false;
    }

    /// Back to the default position, uncommitted, no gesture in progress.
    pub fn reset(&mut self) {
        self.placement.position = self.clamp(self.default_position);
        self.placement.committed = false;
        self.dragging = false;
    }

    fn clamp(&self, p: ScreenPoint) -> ScreenPoint {
        let Some(bounds) = self.bounds else {
            return p.snapped();
        };
        let max_x = snap_down((bounds.width - self.overlay.width).max(0.0));
        let max_y = snap_down((bounds.height - self.overlay.height).max(0.0));
        ScreenPoint::new(clamp_axis(p.x, max_x), clamp_axis(p.y, max_y))
    }
}

fn clamp_axis(v: f64, max: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        snap(v).clamp(0.0, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PlacementController {
        let mut c = PlacementController::new(DEFAULT_POSITION, 0);
        c.set_bounds(Some(Extent::new(600.0, 776.0)));
        c
    }

    #[test]
    fn release_commits_and_move_uncommits() {
        let mut c = controller();
        assert!(!c.is_committed());
        c.on_drag_release(120.0, 80.0);
        assert!(c.is_committed());
        assert_eq!(c.position(), ScreenPoint::new(120.0, 80.0));

        c.on_drag_move(5.0, 5.0);
        assert!(!c.is_committed());
        assert_eq!(c.drag_preview(), Some(ScreenPoint::new(125.0, 85.0)));
    }

    #[test]
    fn moves_apply_in_arrival_order() {
        let mut c = controller();
        c.on_drag_move(10.0, 0.0);
        c.on_drag_move(0.0, 20.0);
        c.on_drag_move(-5.0, -5.0);
        assert_eq!(c.position(), ScreenPoint::new(105.0, 115.0));
        assert!(c.is_dragging());
        c.on_drag_release(105.0, 115.0);
        assert!(!c.is_dragging());
        assert_eq!(c.drag_preview(), None);
    }

    #[test]
    fn positions_clamp_to_parent_bounds() {
        let mut c = controller();
        c.on_drag_move(-1000.0, 5000.0);
        assert_eq!(c.position(), ScreenPoint::new(0.0, 776.0));

        let p = c.on_drag_release(650.0, -3.0);
        assert_eq!(p, ScreenPoint::new(600.0, 0.0));
    }

    #[test]
    fn overlay_extent_stays_inside_bounds() {
        let mut c = controller();
        c.set_overlay_extent(Extent::new(100.0, 30.0));
        let p = c.on_drag_release(590.0, 770.0);
        assert_eq!(p, ScreenPoint::new(500.0, 746.0));
    }

    #[test]
    fn overlay_larger_than_bounds_pins_to_origin() {
        let mut c = controller();
        c.set_overlay_extent(Extent::new(900.0, 900.0));
        let p = c.on_drag_release(50.0, 50.0);
        assert_eq!(p, ScreenPoint::new(0.0, 0.0));
    }

    #[test]
    fn shrinking_bounds_reclamps_position() {
        let mut c = controller();
        c.on_drag_release(500.0, 700.0);
        c.set_bounds(Some(Extent::new(320.0, 414.0)));
        assert_eq!(c.position(), ScreenPoint::new(320.0, 414.0));
    }

    #[test]
    fn cancel_drag_ends_preview_without_committing() {
        let mut c = controller();
        c.on_drag_move(10.0, 10.0);
        c.cancel_drag();
        assert_eq!(c.drag_preview(), None);
        assert!(!c.is_committed());
        assert_eq!(c.position(), ScreenPoint::new(110.0, 110.0));
    }

    #[test]
    fn nan_input_is_pinned() {
        let mut c = controller();
        let p = c.on_drag_release(f64::NAN, 10.0);
        assert_eq!(p, ScreenPoint::new(0.0, 10.0));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut c = controller();
        c.on_drag_release(300.0, 300.0);
        c.reset();
        let once = *c.placement();
        c.reset();
        assert_eq!(c.placement(), &once);
        assert_eq!(once.position, DEFAULT_POSITION);
        assert!(!once.committed);
    }

    #[test]
    fn positions_land_on_the_grid() {
        let mut c = controller();
        let p = c.on_drag_release(120.0, 80.3);
        assert_eq!(p, ScreenPoint::new(120.0, 80.296875));

        c.set_bounds(Some(Extent::new(600.0, 776.4705882352941)));
        let p = c.on_drag_release(10.0, 9000.0);
        assert_eq!(p.y, 776.46875);
        assert!(p.y <= 776.4705882352941);
    }

    #[test]
    fn unbounded_controller_does_not_clamp() {
        let mut c = PlacementController::new(DEFAULT_POSITION, 0);
        let p = c.on_drag_release(-20.0, 9000.0);
        assert_eq!(p, ScreenPoint::new(-20.0, 9000.0));
    }
}
