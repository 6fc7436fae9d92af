//! From classified pixels to per-shade outlines.

use std::time::Instant;

use geo::{Coord, MultiPolygon, Simplify};
use lithochrome_blend::{ClassifiedImage, ShadePalette};
use rayon::ThreadPool;

use crate::grid::{CountGrid, OccupancyGrid};
use crate::marching::trace_rings;
use crate::ops;
use crate::parallel::{run_tasks, ProgressFn};
use crate::rings::assemble;

/// Outlines indexed `[filament][layers - 1]`, in pixel units with Y up.
pub type LayerStack = Vec<Vec<MultiPolygon<f64>>>;

/// Contour tracing parameters, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourSettings {
    /// Polygons smaller than this (px²) are dropped.
    pub min_area: f64,
    /// Douglas-Peucker tolerance (px).
    pub simplify_tolerance: f64,
    /// Iso level in `(0, 1)`; lower values trace wider outlines.
    pub level: f64,
}

impl Default for ContourSettings {
    fn default() -> Self {
        Self {
            min_area: 3.0,
            simplify_tolerance: 1.0,
            level: 0.5,
        }
    }
}

/// Layer count of every pixel for every filament.
///
/// The substrate grid holds 1 at every opaque pixel. Grid `i > 0` holds the
/// layer count of pixels classified to filament `i`.
pub fn count_grids(classified: &ClassifiedImage, palette: &ShadePalette) -> Vec<CountGrid> {
    let (w, h) = (classified.width() as usize, classified.height() as usize);
    let mut grids = vec![CountGrid::new(w, h); palette.filament_count()];
    for (i, key) in classified.keys().iter().enumerate() {
        let Some(key) = key else {
            continue;
        };
        let (x, y) = (i % w, i / w);
        if let Some(substrate) = grids.first_mut() {
            substrate.set(x, y, 1);
        }
        if key.filament > 0 {
            if let Some(grid) = grids.get_mut(key.filament) {
                grid.set(x, y, key.layers as u32);
            }
        }
    }
    grids
}

/// Outline of the set cells of `grid`.
///
/// Pixel `(x, y)` covers `[x, x+1] × [h-y-1, h-y]` in the output, so traced
/// outlines line up with the image flipped to Y up. Simplification can make
/// rings cross, so the simplified outline goes through another self-union;
/// the result never has crossing rings.
pub fn trace_occupancy(grid: &OccupancyGrid, settings: &ContourSettings, image_height: usize) -> MultiPolygon<f64> {
    if grid.is_empty() {
        return ops::empty();
    }
    let height = image_height as f64;
    // Lattice point (i, j) of the padded grid is the centre of pixel (i-1, j-1).
    let rings: Vec<Vec<Coord<f64>>> = trace_rings(&grid.padded(1), settings.level)
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|c| Coord {
                    x: c.x - 0.5,
                    y: height - (c.y - 0.5),
                })
                .collect()
        })
        .collect();

    let mut outline = ops::normalize(&assemble(rings));
    if settings.simplify_tolerance > 0.0 {
        outline = ops::normalize(&outline.simplify(&settings.simplify_tolerance));
    }
    ops::remove_small(outline, settings.min_area)
}

/// Trace every `(filament, layers)` pair on `pool`.
///
/// Progress covers `[0, 0.5]`. A pair whose task fails is logged and left
/// empty.
pub fn extract_layers(
    classified: &ClassifiedImage,
    palette: &ShadePalette,
    settings: &ContourSettings,
    pool: &ThreadPool,
    progress: &ProgressFn<'_>,
) -> LayerStack {
    let start = Instant::now();
    let grids = count_grids(classified, palette);
    let height = classified.height() as usize;

    let tasks: Vec<(usize, usize)> = palette
        .ladders()
        .iter()
        .enumerate()
        .flat_map(|(i, ladder)| (1..=ladder.len()).map(move |layers| (i, layers)))
        .collect();

    let traced = run_tasks(
        pool,
        &tasks,
        |&(i, layers)| {
            let occupancy = grids[i].occupancy(layers as u32);
            let outline = trace_occupancy(&occupancy, settings, height);
            log::debug!(
                "filament {i} x{layers}: {} cells, {} polygons",
                occupancy.count(),
                outline.0.len()
            );
            outline
        },
        progress,
        0.0..0.5,
    );

    let mut stack: LayerStack = palette
        .ladders()
        .iter()
        .map(|ladder| vec![ops::empty(); ladder.len()])
        .collect();
    for (&(i, layers), outline) in tasks.iter().zip(traced) {
        stack[i][layers - 1] = outline.unwrap_or_else(ops::empty);
    }
    log::info!(
        "traced {} shade outlines in {:.2?}",
        tasks.len(),
        start.elapsed()
    );
    stack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{no_progress, worker_pool};
    use image::{Rgba, RgbaImage};
    use lithochrome_blend::{build_shades, classify, Filament, Rgb, ShadeKey};

    fn black_white() -> ShadePalette {
        build_shades(
            &[
                Filament::new(Rgb::BLACK, 0.0, 1),
                Filament::new(Rgb::WHITE, 7.5, 5),
            ],
            0.2,
        )
        .unwrap()
    }

    fn shade_image(palette: &ShadePalette, w: u32, h: u32, f: impl Fn(u32, u32) -> Option<ShadeKey>) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| match f(x, y).and_then(|k| palette.shade(k)) {
            Some(c) => Rgba(c.to_rgba()),
            None => Rgba([0, 0, 0, 0]),
        })
    }

    #[test]
    fn test_filled_square_traces_one_polygon() {
        let mut grid = OccupancyGrid::new(10, 10);
        for y in 0..10 {
            for x in 0..10 {
                grid.set(x, y, true);
            }
        }
        let mp = trace_occupancy(&grid, &ContourSettings::default(), 10);
        assert_eq!(mp.0.len(), 1);
        assert!(mp.0[0].interiors().is_empty());
        assert!((ops::area(&mp) - 100.0).abs() < 5.0);
    }

    #[test]
    fn test_trace_flips_y() {
        let mut grid = OccupancyGrid::new(4, 10);
        for x in 0..4 {
            for y in 0..3 {
                grid.set(x, y, true);
            }
        }
        let settings = ContourSettings {
            min_area: 0.0,
            simplify_tolerance: 0.0,
            level: 0.5,
        };
        let mp = trace_occupancy(&grid, &settings, 10);
        // Top rows of the image end up at the top of the Y-up outline.
        assert!(mp.0[0].exterior().coords().all(|c| c.y >= 6.9 && c.y <= 10.1));
    }

    #[test]
    fn test_small_islands_dropped() {
        let mut grid = OccupancyGrid::new(8, 8);
        grid.set(1, 1, true);
        let mp = trace_occupancy(&grid, &ContourSettings::default(), 8);
        assert!(mp.0.is_empty());
    }

    #[test]
    fn test_count_grids_follow_keys() {
        let palette = black_white();
        let image = shade_image(&palette, 4, 4, |x, y| match (x, y) {
            (0, 0) => None,
            (1, _) => Some(ShadeKey::new(1, 3)),
            _ => Some(ShadeKey::new(0, 1)),
        });
        let classified = classify(&image, &palette);
        let grids = count_grids(&classified, &palette);
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0].get(0, 0), 0);
        assert_eq!(grids[0].get(1, 2), 1);
        assert_eq!(grids[0].get(3, 3), 1);
        assert_eq!(grids[1].get(1, 2), 3);
        assert_eq!(grids[1].get(2, 2), 0);
    }

    #[test]
    fn test_uniform_shade_stack() {
        let palette = black_white();
        let image = shade_image(&palette, 4, 4, |_, _| Some(ShadeKey::new(1, 3)));
        let classified = classify(&image, &palette);
        let pool = worker_pool(Some(2)).unwrap();
        let settings = ContourSettings {
            min_area: 0.5,
            ..Default::default()
        };
        let stack = extract_layers(&classified, &palette, &settings, &pool, &no_progress);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[1].len(), 5);
        assert!(!stack[0][0].0.is_empty());
        for layers in 1..=3 {
            assert!(!stack[1][layers - 1].0.is_empty());
        }
        assert!(stack[1][3].0.is_empty());
        assert!(stack[1][4].0.is_empty());
    }

    #[test]
    fn test_pool_size_does_not_change_result() {
        let palette = black_white();
        let image = shade_image(&palette, 24, 18, |x, y| {
            let d = ((x as i32 - 12).pow(2) + (y as i32 - 9).pow(2)) as f64;
            let layers = 5 - (d.sqrt() / 3.0).min(5.0) as usize;
            if layers == 0 {
                Some(ShadeKey::new(0, 1))
            } else {
                Some(ShadeKey::new(1, layers))
            }
        });
        let classified = classify(&image, &palette);
        let settings = ContourSettings::default();
        let one = extract_layers(&classified, &palette, &settings, &worker_pool(Some(1)).unwrap(), &no_progress);
        let four = extract_layers(&classified, &palette, &settings, &worker_pool(Some(4)).unwrap(), &no_progress);
        assert_eq!(one, four);
    }

    /// Deterministic xorshift fill of `fill` percent of the cells.
    fn noisy_grid(w: usize, h: usize, seed: u64, fill: u64) -> OccupancyGrid {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let mut grid = OccupancyGrid::new(w, h);
        for y in 0..h {
            for x in 0..w {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                grid.set(x, y, state % 100 < fill);
            }
        }
        grid
    }

    fn segments(mp: &MultiPolygon<f64>) -> Vec<(Coord<f64>, Coord<f64>)> {
        mp.0.iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .flat_map(|ring| ring.lines().map(|l| (l.start, l.end)))
            .collect()
    }

    /// Pairs of ring segments that cross at an interior point of both.
    fn proper_crossings(mp: &MultiPolygon<f64>) -> usize {
        let orient = |a: Coord<f64>, b: Coord<f64>, c: Coord<f64>| (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        let segs = segments(mp);
        let mut count = 0;
        for (i, &(a, b)) in segs.iter().enumerate() {
            for &(c, d) in &segs[i + 1..] {
                if orient(a, b, c) * orient(a, b, d) < 0.0 && orient(c, d, a) * orient(c, d, b) < 0.0 {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn test_noisy_outlines_have_no_crossing_rings() {
        for seed in 1..=6 {
            let grid = noisy_grid(40, 40, seed, 55);
            for tolerance in [1.0, 2.0] {
                let settings = ContourSettings {
                    simplify_tolerance: tolerance,
                    ..Default::default()
                };
                let mp = trace_occupancy(&grid, &settings, 40);
                assert!(!mp.0.is_empty());
                assert_eq!(proper_crossings(&mp), 0, "seed {seed}, tolerance {tolerance}");
            }
        }
    }

    #[test]
    fn test_noisy_stack_stays_valid_after_merge() {
        let palette = black_white();
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let keys: Vec<ShadeKey> = (0..32 * 32)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                match state % 6 {
                    0 => ShadeKey::new(0, 1),
                    n => ShadeKey::new(1, n as usize),
                }
            })
            .collect();
        let image = shade_image(&palette, 32, 32, |x, y| Some(keys[(y * 32 + x) as usize]));
        let classified = classify(&image, &palette);
        let settings = ContourSettings {
            simplify_tolerance: 2.0,
            ..Default::default()
        };
        let stack = extract_layers(&classified, &palette, &settings, &worker_pool(Some(2)).unwrap(), &no_progress);
        let merged = crate::merge::merge_downward(&stack);
        for outline in stack.iter().chain(merged.iter()).flatten() {
            assert_eq!(proper_crossings(outline), 0);
        }
    }
}
