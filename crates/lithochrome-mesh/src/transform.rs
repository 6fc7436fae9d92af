//! Affine transforms for placing layer meshes.

use nalgebra::{Matrix4, Point3, Vector3};

/// Affine map applied to mesh vertices, stored as a homogeneous matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform(Matrix4<f64>);

impl Transform {
    /// Shift by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self(Matrix4::new_translation(&Vector3::new(dx, dy, dz)))
    }

    /// Per-axis scale about the origin.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self(Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)))
    }

    /// Pixel-unit layer geometry to millimetres: `xy` mm per pixel, height
    /// stretched by `z_scale`, then lifted to `z`.
    pub fn place(xy: f64, z_scale: f64, z: f64) -> Self {
        Self::translation(0.0, 0.0, z).then(&Self::scale(xy, xy, z_scale))
    }

    /// `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Self {
        Self(self.0 * other.0)
    }

    /// Map a position.
    pub fn apply_point(&self, p: [f64; 3]) -> [f64; 3] {
        let q = self.0.transform_point(&Point3::from(p));
        [q.x, q.y, q.z]
    }

    /// Map a unit normal by the inverse transpose, renormalized.
    pub fn apply_normal(&self, n: [f64; 3]) -> [f64; 3] {
        let linear = self.0.fixed_view::<3, 3>(0, 0);
        let n = Vector3::from(n);
        let out = linear
            .try_inverse()
            .map_or(n, |inv| inv.transpose() * n)
            .try_normalize(0.0)
            .unwrap_or(n);
        [out.x, out.y, out.z]
    }
}
