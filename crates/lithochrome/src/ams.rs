//! Meshes for the per-pixel search mode.
//!
//! A [`LayerPlan`] assigns one filament per pixel per layer. Each
//! `(layer, filament)` mask is traced with the same extractor as the
//! shade-ladder mode and extruded one layer tall at its height in the
//! stack. Transparent pixels stay empty in every layer, the substrate
//! included.

use std::collections::BTreeMap;
use std::time::Instant;

use image::RgbaImage;
use lithochrome_blend::{plan_layers, LayerPlan, PaletteFilament, SearchSettings, SequenceCache};
use lithochrome_contour::{run_tasks, trace_occupancy, ContourSettings, OccupancyGrid, ProgressFn};
use lithochrome_mesh::{base_slab, extrude_layer, FilamentMesh, MeshError, Transform, TriangleMesh};
use rayon::ThreadPool;

use crate::config::AmsProject;
use crate::error::Result;

/// Print size used when the search settings leave it open.
pub const DEFAULT_SIZE_MM: f64 = 100.0;

/// Plan `image` with a palette project.
pub fn plan(project: &AmsProject, image: &RgbaImage, cache: &mut SequenceCache) -> Result<LayerPlan> {
    Ok(plan_layers(image, &project.filaments, &project.search, cache)?)
}

/// One merged mesh per filament used by `plan`, in filament order.
///
/// Face up, the substrate gets a slab `substrate_layers` thick under the
/// opaque footprint of the image, and plan layer `k` sits on top of it at
/// `k · layer_height`. Face down, the plan already holds the substrate
/// layers and layer 0 rests on the bed. Progress covers `[0, 1]`.
pub fn meshes(
    plan: &LayerPlan,
    filaments: &[PaletteFilament],
    settings: &SearchSettings,
    contour: &ContourSettings,
    pool: &ThreadPool,
    progress: &ProgressFn<'_>,
) -> Result<Vec<FilamentMesh>> {
    settings.validate(filaments)?;
    if plan.width == 0 || plan.height == 0 {
        return Err(MeshError::EmptyImage.into());
    }
    let size = settings.max_size_mm.unwrap_or(DEFAULT_SIZE_MM);
    if !size.is_finite() || size <= 0.0 {
        return Err(MeshError::InvalidSize(size).into());
    }
    let start = Instant::now();
    let (w, h) = (plan.width as usize, plan.height as usize);
    let lh = settings.layer_height;
    let xy = size / f64::from(plan.width.max(plan.height));
    let base = if plan.face_down {
        0.0
    } else {
        f64::from(settings.substrate_layers) * lh
    };

    let tasks: Vec<(usize, usize)> = (0..plan.layer_count())
        .flat_map(|layer| {
            plan.filaments_in_layer(layer)
                .into_iter()
                .map(move |filament| (layer, filament))
        })
        .collect();
    let extruded = run_tasks(
        pool,
        &tasks,
        |&(layer, filament)| {
            let Some(grid) = OccupancyGrid::from_cells(w, h, plan.occupancy(layer, filament)) else {
                return TriangleMesh::new();
            };
            let outline = trace_occupancy(&grid, contour, h);
            let z = base + layer as f64 * lh;
            extrude_layer(&outline, lh)
                .transformed(&Transform::place(xy, 1.0, z))
        },
        progress,
        0.0..1.0,
    );

    let mut by_filament: BTreeMap<usize, TriangleMesh> = BTreeMap::new();
    if !plan.face_down && base > 0.0 {
        if let Some(grid) = OccupancyGrid::from_cells(w, h, plan.opaque.clone()) {
            let footprint = trace_occupancy(&grid, contour, h);
            by_filament.insert(plan.substrate, base_slab(&footprint, base, xy));
        }
    }
    for (&(_, filament), mesh) in tasks.iter().zip(extruded) {
        if let Some(mesh) = mesh.filter(|m| !m.is_empty()) {
            by_filament.entry(filament).or_default().merge(&mesh);
        }
    }

    let meshes: Vec<FilamentMesh> = by_filament
        .into_iter()
        .filter(|(_, mesh)| !mesh.is_empty())
        .map(|(filament, mesh)| FilamentMesh {
            filament,
            layers: None,
            mesh,
        })
        .collect();
    log::info!(
        "built {} filament meshes from {} layers in {:.2?}",
        meshes.len(),
        plan.layer_count(),
        start.elapsed()
    );
    Ok(meshes)
}
