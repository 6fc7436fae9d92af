//! Z-stacking of extruded layer outlines.

use std::time::Instant;

use geo::MultiPolygon;
use lithochrome_contour::{run_tasks, LayerStack, ProgressFn};
use rayon::ThreadPool;

use crate::error::{MeshError, Result};
use crate::extrude::extrude_layer;
use crate::mesh::TriangleMesh;
use crate::transform::Transform;

/// How stacked meshes are grouped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    /// One mesh per filament holding all of its layers.
    #[default]
    PerFilament,
    /// One mesh per `(filament, layers)` pair.
    PerLayer,
}

/// Physical parameters of the printed stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSettings {
    /// Height of one printed layer (mm).
    pub layer_height: f64,
    /// Number of layers the substrate occupies; 0 omits it.
    pub base_layers: u32,
    /// Longest side of the print (mm).
    pub max_size_mm: f64,
    /// Output grouping.
    pub granularity: Granularity,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            base_layers: 3,
            max_size_mm: 100.0,
            granularity: Granularity::PerFilament,
        }
    }
}

impl StackSettings {
    /// Check that heights and sizes are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.layer_height.is_finite() || self.layer_height <= 0.0 {
            return Err(MeshError::InvalidLayerHeight(self.layer_height));
        }
        if !self.max_size_mm.is_finite() || self.max_size_mm <= 0.0 {
            return Err(MeshError::InvalidSize(self.max_size_mm));
        }
        Ok(())
    }

    /// Millimetres per pixel for an image of the given size.
    pub fn xy_scale(&self, width: u32, height: u32) -> f64 {
        self.max_size_mm / f64::from(width.max(height).max(1))
    }
}

/// A mesh assigned to one filament.
#[derive(Debug, Clone, PartialEq)]
pub struct FilamentMesh {
    /// Filament index.
    pub filament: usize,
    /// Layer count for [`Granularity::PerLayer`], `None` for a whole filament.
    pub layers: Option<usize>,
    /// Geometry in millimetres.
    pub mesh: TriangleMesh,
}

/// Extrude and stack every pair of `stack`.
///
/// Pairs are extruded in parallel at one layer height each; progress covers
/// `[0, 1]`. The substrate block is `base_layers` thick. Every later
/// non-empty pair sits on top of the previous one in print order, and empty
/// pairs take no height. Empty meshes are left out of the result.
pub fn stack_meshes(
    stack: &LayerStack,
    image_width: u32,
    image_height: u32,
    settings: &StackSettings,
    pool: &ThreadPool,
    progress: &ProgressFn<'_>,
) -> Result<Vec<FilamentMesh>> {
    settings.validate()?;
    if image_width == 0 || image_height == 0 {
        return Err(MeshError::EmptyImage);
    }
    let start = Instant::now();
    let lh = settings.layer_height;

    let tasks: Vec<(usize, usize)> = stack
        .iter()
        .enumerate()
        .flat_map(|(i, ladder)| (0..ladder.len()).map(move |rung| (i, rung)))
        .collect();
    let prisms = run_tasks(
        pool,
        &tasks,
        |&(i, rung)| extrude_layer(&stack[i][rung], lh),
        progress,
        0.0..1.0,
    );

    let xy = settings.xy_scale(image_width, image_height);
    let mut cursor = 0.0;
    let mut meshes: Vec<FilamentMesh> = Vec::new();
    for (&(filament, rung), prism) in tasks.iter().zip(prisms) {
        let Some(prism) = prism.filter(|m| !m.is_empty()) else {
            continue;
        };
        let placed = if filament == 0 {
            if settings.base_layers == 0 {
                continue;
            }
            let z = f64::from(settings.base_layers);
            let t = Transform::place(xy, z, cursor);
            cursor += lh * z;
            prism.transformed(&t)
        } else {
            let t = Transform::place(xy, 1.0, cursor);
            cursor += lh;
            prism.transformed(&t)
        };

        match settings.granularity {
            Granularity::PerLayer => meshes.push(FilamentMesh {
                filament,
                layers: Some(rung + 1),
                mesh: placed,
            }),
            Granularity::PerFilament => match meshes.last_mut() {
                Some(last) if last.filament == filament => last.mesh.merge(&placed),
                _ => meshes.push(FilamentMesh {
                    filament,
                    layers: None,
                    mesh: placed,
                }),
            },
        }
    }

    log::info!(
        "stacked {} meshes, {:.2} mm tall, in {:.2?}",
        meshes.len(),
        cursor,
        start.elapsed()
    );
    Ok(meshes)
}

/// Solid slab under `footprint`, `thickness` mm tall.
///
/// `footprint` is in pixel units and `scale` is millimetres per pixel. A
/// non-positive thickness or an empty footprint gives an empty mesh.
pub fn base_slab(footprint: &MultiPolygon<f64>, thickness: f64, scale: f64) -> TriangleMesh {
    extrude_layer(footprint, thickness).transformed(&Transform::scale(scale, scale, 1.0))
}
