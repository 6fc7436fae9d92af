//! Binary STL output.

use lithochrome::mesh::{face_normal, TriangleMesh};

const TITLE: &[u8] = b"lithochrome binary STL";

/// Serialize `mesh` as binary STL with per-face normals.
pub fn stl_bytes(mesh: &TriangleMesh) -> Vec<u8> {
    let mut data = Vec::with_capacity(84 + mesh.num_triangles() * 50);
    let mut header = [b' '; 80];
    header[..TITLE.len()].copy_from_slice(TITLE);
    data.extend_from_slice(&header);
    data.extend_from_slice(&(mesh.num_triangles() as u32).to_le_bytes());

    for tri in mesh.triangles() {
        let [a, b, c] = tri.map(|v| v.map(f64::from));
        let n = face_normal(a, b, c);
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let n = if len > 1e-12 {
            n.map(|x| (x / len) as f32)
        } else {
            [0.0, 0.0, 1.0]
        };
        for x in n {
            data.extend_from_slice(&x.to_le_bytes());
        }
        for v in tri {
            for x in v {
                data.extend_from_slice(&x.to_le_bytes());
            }
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stl_layout() {
        let mesh = TriangleMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            normals: Vec::new(),
        };
        let bytes = stl_bytes(&mesh);
        assert_eq!(bytes.len(), 84 + 50);
        assert_eq!(&bytes[80..84], &1u32.to_le_bytes());
        // Counter-clockwise in XY faces +Z.
        assert_eq!(&bytes[92..96], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[96..100], &0.0f32.to_le_bytes());
    }

    #[test]
    fn test_empty_mesh() {
        let bytes = stl_bytes(&TriangleMesh::new());
        assert_eq!(bytes.len(), 84);
        assert!(bytes.starts_with(b"lithochrome"));
    }
}
