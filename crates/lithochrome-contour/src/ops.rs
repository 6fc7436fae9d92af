//! Polygon set operations.

use geo::orient::{Direction, Orient};
use geo::{Area, MultiPolygon};
use geo_clipper::Clipper;

/// Fixed-point factor for clipper: coordinates keep 1/1000 pixel precision.
const CLIPPER_SCALE: f64 = 1000.0;

/// Empty polygon set.
pub fn empty() -> MultiPolygon<f64> {
    MultiPolygon::new(Vec::new())
}

/// Union of two polygon sets.
pub fn union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if a.0.is_empty() {
        return b.clone();
    }
    if b.0.is_empty() {
        return a.clone();
    }
    a.union(b, CLIPPER_SCALE)
}

/// Resolve self-intersections and overlaps by a union with nothing.
///
/// Rings are first oriented (exterior counter-clockwise, holes clockwise)
/// so the non-zero fill rule treats holes as holes.
pub fn normalize(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if mp.0.is_empty() {
        return empty();
    }
    let oriented = mp.orient(Direction::Default);
    oriented.union(&empty(), CLIPPER_SCALE).orient(Direction::Default)
}

/// Total unsigned area.
pub fn area(mp: &MultiPolygon<f64>) -> f64 {
    mp.unsigned_area()
}

/// Keep polygons with at least `min_area`.
pub fn remove_small(mp: MultiPolygon<f64>, min_area: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(
        mp.0
            .into_iter()
            .filter(|p| p.unsigned_area() >= min_area)
            .collect(),
    )
}
