//! Indexed triangle meshes.

use std::collections::HashSet;

use crate::transform::Transform;

/// Indexed triangle mesh for export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32).
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    pub indices: Vec<u32>,
    /// Flat array of vertex normals: `[nx0, ny0, nz0, ...]` (f32). Same length as vertices.
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Position of vertex `i`.
    pub fn vertex(&self, i: usize) -> [f32; 3] {
        [
            self.vertices[i * 3],
            self.vertices[i * 3 + 1],
            self.vertices[i * 3 + 2],
        ]
    }

    /// Triangles as vertex positions.
    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.vertex(t[0] as usize),
                self.vertex(t[1] as usize),
                self.vertex(t[2] as usize),
            ]
        })
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
    }

    /// Recompute vertex normals as area-weighted face normals.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![0.0f64; self.vertices.len()];
        for t in self.indices.chunks_exact(3) {
            let [a, b, c] = [t[0] as usize, t[1] as usize, t[2] as usize];
            let p = |i: usize| {
                [
                    f64::from(self.vertices[i * 3]),
                    f64::from(self.vertices[i * 3 + 1]),
                    f64::from(self.vertices[i * 3 + 2]),
                ]
            };
            let n = face_normal(p(a), p(b), p(c));
            for v in [a, b, c] {
                for k in 0..3 {
                    acc[v * 3 + k] += n[k];
                }
            }
        }
        self.normals = acc
            .chunks_exact(3)
            .flat_map(|n| {
                let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
                if len > 0.0 {
                    [(n[0] / len) as f32, (n[1] / len) as f32, (n[2] / len) as f32]
                } else {
                    [0.0, 0.0, 0.0]
                }
            })
            .collect();
    }

    /// Apply a transform to every vertex and normal.
    pub fn transform(&mut self, t: &Transform) {
        for v in self.vertices.chunks_exact_mut(3) {
            let p = t.apply_point([f64::from(v[0]), f64::from(v[1]), f64::from(v[2])]);
            v[0] = p[0] as f32;
            v[1] = p[1] as f32;
            v[2] = p[2] as f32;
        }
        for n in self.normals.chunks_exact_mut(3) {
            let m = t.apply_normal([f64::from(n[0]), f64::from(n[1]), f64::from(n[2])]);
            n[0] = m[0] as f32;
            n[1] = m[1] as f32;
            n[2] = m[2] as f32;
        }
    }

    /// Transformed copy.
    pub fn transformed(&self, t: &Transform) -> Self {
        let mut out = self.clone();
        out.transform(t);
        out
    }

    /// Axis-aligned bounds as `(min, max)`, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let mut chunks = self.vertices.chunks_exact(3);
        let first = chunks.next()?;
        let mut min = [first[0], first[1], first[2]];
        let mut max = min;
        for v in chunks {
            for k in 0..3 {
                min[k] = min[k].min(v[k]);
                max[k] = max[k].max(v[k]);
            }
        }
        Some((min, max))
    }

    /// Enclosed volume; positive when triangles wind outward.
    pub fn volume(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| {
                let a = a.map(f64::from);
                let b = b.map(f64::from);
                let c = c.map(f64::from);
                a[0] * (b[1] * c[2] - c[1] * b[2]) - b[0] * (a[1] * c[2] - c[1] * a[2])
                    + c[0] * (a[1] * b[2] - b[1] * a[2])
            })
            .sum::<f64>()
            / 6.0
    }

    /// True if every directed edge is matched by exactly one opposite edge.
    pub fn is_closed(&self) -> bool {
        let mut edges = HashSet::with_capacity(self.indices.len());
        for t in self.indices.chunks_exact(3) {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                if !edges.insert((a, b)) {
                    return false;
                }
            }
        }
        edges.iter().all(|&(a, b)| edges.contains(&(b, a)))
    }
}

/// Cross product of two triangle edges; length is twice the area.
pub fn face_normal(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [f64; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Unit tetrahedron with outward winding.
    fn tetra() -> TriangleMesh {
        let mut mesh = TriangleMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            indices: vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
            normals: Vec::new(),
        };
        mesh.compute_normals();
        mesh
    }

    #[test]
    fn test_tetra_volume_and_closure() {
        let mesh = tetra();
        assert_relative_eq!(mesh.volume(), 1.0 / 6.0, epsilon = 1e-9);
        assert!(mesh.is_closed());
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
    }

    #[test]
    fn test_open_mesh_detected() {
        let mut mesh = tetra();
        mesh.indices.truncate(9);
        assert!(!mesh.is_closed());
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = tetra();
        let b = tetra();
        a.merge(&b);
        assert_eq!(a.num_vertices(), 8);
        assert_eq!(a.num_triangles(), 8);
        assert_eq!(a.indices[12], 4);
        assert!(a.is_closed());
        assert_relative_eq!(a.volume(), 2.0 / 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_transform_and_bounds() {
        let mesh = tetra().transformed(&Transform::translation(1.0, 2.0, 3.0).then(&Transform::scale(2.0, 2.0, 2.0)));
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, [1.0, 2.0, 3.0]);
        assert_eq!(max, [3.0, 4.0, 5.0]);
        assert_relative_eq!(mesh.volume(), 8.0 / 6.0, epsilon = 1e-6);
        assert!(TriangleMesh::new().bounds().is_none());
    }
}
