//! Extrusion of outline polygons into closed prisms.

use std::collections::HashMap;

use geo::{Coord, LineString, MultiPolygon, Polygon, TriangulateEarcut};

use crate::mesh::TriangleMesh;

/// Twice the cross product below which a vertex counts as collinear.
const COLLINEAR_EPS: f64 = 1e-12;

fn quantize(c: Coord<f64>) -> [i64; 2] {
    [(c.x * 1e6).round() as i64, (c.y * 1e6).round() as i64]
}

fn signed_area(ring: &[Coord<f64>]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

/// Open ring without repeated or collinear vertices, or `None` when fewer
/// than three vertices or no area remain.
fn clean_ring(ring: &LineString<f64>) -> Option<Vec<Coord<f64>>> {
    let mut pts: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for &c in &ring.0 {
        if pts.last() != Some(&c) {
            pts.push(c);
        }
    }
    while pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }

    // Earcut silently drops collinear vertices; do it first so caps and
    // walls share the same boundary.
    loop {
        let n = pts.len();
        if n < 3 {
            return None;
        }
        let redundant = (0..n).find(|&i| {
            let (p, c, q) = (pts[(i + n - 1) % n], pts[i], pts[(i + 1) % n]);
            let cross = (c.x - p.x) * (q.y - p.y) - (c.y - p.y) * (q.x - p.x);
            cross.abs() <= COLLINEAR_EPS || c == q
        });
        match redundant {
            Some(i) => {
                pts.remove(i);
            }
            None => break,
        }
    }

    if signed_area(&pts).abs() <= COLLINEAR_EPS {
        return None;
    }
    Some(pts)
}

fn oriented(mut ring: Vec<Coord<f64>>, ccw: bool) -> Vec<Coord<f64>> {
    if (signed_area(&ring) > 0.0) != ccw {
        ring.reverse();
    }
    ring
}

/// Extrude `polygon` from `z = 0` to `z = thickness`.
///
/// Caps are ear-cut and mapped back onto the ring vertices, so caps and
/// walls share indices and the result is closed, also when a hole touches
/// the exterior at a vertex. Returns `None` for non-finite coordinates, a
/// degenerate exterior, a triangulation that yields nothing, or a
/// non-positive thickness. Degenerate holes are dropped.
pub fn extrude_polygon(polygon: &Polygon<f64>, thickness: f64) -> Option<TriangleMesh> {
    if !(thickness.is_finite() && thickness > 0.0) {
        return None;
    }
    let finite = |ls: &LineString<f64>| ls.0.iter().all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite(polygon.exterior()) || !polygon.interiors().iter().all(finite) {
        log::debug!("skipping polygon with non-finite coordinates");
        return None;
    }

    let exterior = oriented(clean_ring(polygon.exterior())?, true);
    let holes: Vec<Vec<Coord<f64>>> = polygon
        .interiors()
        .iter()
        .filter_map(clean_ring)
        .map(|ring| oriented(ring, false))
        .collect();

    let rings: Vec<&Vec<Coord<f64>>> = std::iter::once(&exterior).chain(holes.iter()).collect();

    // One bottom vertex per distinct position. Rings that touch at a point
    // share it, so caps and walls agree on every boundary edge.
    let mut index: HashMap<[i64; 2], u32> = HashMap::new();
    let mut positions: Vec<Coord<f64>> = Vec::new();
    let ring_ids: Vec<Vec<u32>> = rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|&c| {
                    *index.entry(quantize(c)).or_insert_with(|| {
                        positions.push(c);
                        positions.len() as u32 - 1
                    })
                })
                .collect()
        })
        .collect();
    let n = positions.len();

    let mut mesh = TriangleMesh::new();
    mesh.vertices.reserve(n * 6);
    for z in [0.0, thickness as f32] {
        for c in &positions {
            mesh.vertices.extend_from_slice(&[c.x as f32, c.y as f32, z]);
        }
    }

    let cap_source = Polygon::new(
        LineString::from(exterior.clone()),
        holes.iter().map(|h| LineString::from(h.clone())).collect(),
    );
    let mut cap: Vec<[u32; 3]> = Vec::new();
    let mut winding = 0.0;
    for tri in cap_source.earcut_triangles() {
        let [a, b, c] = tri.to_array();
        let ids = [a, b, c].map(|p| index.get(&quantize(p)).copied());
        if let [Some(i), Some(j), Some(k)] = ids {
            if i == j || j == k || i == k {
                continue;
            }
            winding += signed_area(&[a, b, c]);
            cap.push([i, j, k]);
        }
    }
    if cap.is_empty() {
        log::debug!("triangulation of {n}-vertex polygon is empty");
        return None;
    }
    if winding < 0.0 {
        for t in &mut cap {
            t.swap(1, 2);
        }
    }

    let top = n as u32;
    for &[a, b, c] in &cap {
        mesh.indices.extend_from_slice(&[a + top, b + top, c + top]);
        mesh.indices.extend_from_slice(&[a, c, b]);
    }

    for ids in &ring_ids {
        for (k, &a) in ids.iter().enumerate() {
            let b = ids[(k + 1) % ids.len()];
            mesh.indices.extend_from_slice(&[a, b, b + top, a, b + top, a + top]);
        }
    }

    mesh.compute_normals();
    Some(mesh)
}

/// Extrude every polygon of `outline` and merge the prisms.
pub fn extrude_layer(outline: &MultiPolygon<f64>, thickness: f64) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    let mut skipped = 0;
    for polygon in &outline.0 {
        match extrude_polygon(polygon, thickness) {
            Some(prism) => mesh.merge(&prism),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        log::debug!("skipped {skipped} degenerate polygons");
    }
    mesh
}
