#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use markup::geometry::distance_to_segment;
use markup::{MarkupDocument, Shape, ShapeId, ShapeKind};

use crate::camera::{Camera, Point};
use crate::consts::PATH_HIT_TOLERANCE_PX;

/// Topmost shape under `world_pt`, or `None`.
///
/// Shapes are tested in reverse z-order so the last-drawn shape wins overlaps.
#[must_use]
pub fn hit_test(world_pt: Point, doc: &MarkupDocument, camera: &Camera) -> Option<ShapeId> {
    let tolerance = camera.screen_dist_to_world(PATH_HIT_TOLERANCE_PX);
    doc.shapes()
        .iter()
        .rev()
        .find(|shape| shape_contains(shape, world_pt, tolerance))
        .map(|shape| shape.id)
}

/// Whether `pt` lands on `shape`. `tolerance` applies to pen strokes only.
#[must_use]
pub fn shape_contains(shape: &Shape, pt: Point, tolerance: f64) -> bool {
    match &shape.kind {
        ShapeKind::Box { .. } | ShapeKind::TextLabel { .. } => shape.bounds().contains(pt),
        ShapeKind::Path { points, .. } => match points.as_slice() {
            [] => false,
            [only] => only.distance_to(pt) <= tolerance,
            _ => points
                .windows(2)
                .any(|seg| distance_to_segment(pt, seg[0], seg[1]) <= tolerance),
        },
    }
}
