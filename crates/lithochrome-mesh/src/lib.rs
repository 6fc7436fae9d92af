#![warn(missing_docs)]

//! Triangle meshes for lithochrome prints.
//!
//! Each `(filament, layers)` outline is extruded into a closed prism one
//! layer tall, and the prisms are stacked in print order on top of the
//! substrate block.
//!
//! # Example
//!
//! ```
//! use geo::polygon;
//! use lithochrome_mesh::extrude_polygon;
//!
//! let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
//! let prism = extrude_polygon(&square, 0.2).unwrap();
//! assert!(prism.is_closed());
//! ```

mod error;
pub mod extrude;
pub mod mesh;
pub mod stack;
pub mod transform;

pub use error::{MeshError, Result};
pub use extrude::{extrude_layer, extrude_polygon};
pub use mesh::{face_normal, TriangleMesh};
pub use stack::{base_slab, stack_meshes, FilamentMesh, Granularity, StackSettings};
pub use transform::Transform;
