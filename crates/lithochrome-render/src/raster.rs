//! Scanline rasterization of a layer stack.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use geo::MultiPolygon;
use image::RgbaImage;
use lithochrome_blend::{ShadeKey, ShadePalette};
use lithochrome_contour::{LayerStack, ProgressFn};
use rayon::prelude::*;

/// Preview raster size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Length of the longer output side in pixels.
    pub longest_side: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self { longest_side: 2048 }
    }
}

impl RenderSettings {
    /// Size for a print `max_size_mm` long at `px_per_mm` resolution.
    pub fn from_physical(max_size_mm: f64, px_per_mm: f64) -> Self {
        let side = (max_size_mm * px_per_mm).round();
        let longest_side = if side.is_finite() && side >= 1.0 {
            side.min(f64::from(u32::MAX)) as u32
        } else {
            1
        };
        Self { longest_side }
    }

    /// Output size for an image of `width × height`, keeping the aspect
    /// ratio.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (0, 0);
        }
        let scale = f64::from(self.longest_side.max(1)) / f64::from(width.max(height));
        let side = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
        (side(width), side(height))
    }
}

/// Non-horizontal edge in output pixel space (Y down).
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

struct Paint {
    color: [u8; 4],
    edges: Vec<Edge>,
}

fn edges(outline: &MultiPolygon<f64>, sx: f64, sy: f64, height: f64) -> Vec<Edge> {
    let mut out = Vec::new();
    for polygon in &outline.0 {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            for line in ring.lines() {
                let e = Edge {
                    x0: line.start.x * sx,
                    y0: (height - line.start.y) * sy,
                    x1: line.end.x * sx,
                    y1: (height - line.end.y) * sy,
                };
                if e.y0 != e.y1 {
                    out.push(e);
                }
            }
        }
    }
    out
}

/// Even-odd fill of one output row, sampling pixel centres.
fn fill_row(row: &mut [u8], y: usize, paint: &Paint, crossings: &mut Vec<f64>) {
    let yc = y as f64 + 0.5;
    crossings.clear();
    crossings.extend(
        paint
            .edges
            .iter()
            .filter(|e| (e.y0 > yc) != (e.y1 > yc))
            .map(|e| e.x0 + (yc - e.y0) * (e.x1 - e.x0) / (e.y1 - e.y0)),
    );
    crossings.sort_by(f64::total_cmp);

    let width = row.len() / 4;
    for span in crossings.chunks_exact(2) {
        let start = ((span[0] - 0.5).ceil().max(0.0) as usize).min(width);
        let end = ((span[1] - 0.5).ceil().max(0.0) as usize).min(width);
        for px in row[start * 4..end * 4].chunks_exact_mut(4) {
            px.copy_from_slice(&paint.color);
        }
    }
}

/// Paint `stack` into a preview image.
///
/// `stack` is in pixel units of an `image_width × image_height` source with
/// Y up. Pairs are painted in print order so the topmost visible pair wins,
/// each with its exact shade colour and no anti-aliasing. Uncovered pixels
/// stay transparent. Progress covers `[0.5, 1]`.
pub fn render_preview(
    stack: &LayerStack,
    palette: &ShadePalette,
    image_width: u32,
    image_height: u32,
    settings: &RenderSettings,
    progress: &ProgressFn<'_>,
) -> RgbaImage {
    let start = Instant::now();
    let (out_w, out_h) = settings.output_size(image_width, image_height);
    let mut image = RgbaImage::new(out_w, out_h);
    if out_w == 0 || out_h == 0 {
        progress(1.0);
        return image;
    }
    let sx = f64::from(out_w) / f64::from(image_width);
    let sy = f64::from(out_h) / f64::from(image_height);
    let height = f64::from(image_height);

    let paints: Vec<Paint> = stack
        .iter()
        .enumerate()
        .flat_map(|(i, ladder)| ladder.iter().enumerate().map(move |(rung, outline)| (i, rung, outline)))
        .filter(|(_, _, outline)| !outline.0.is_empty())
        .filter_map(|(i, rung, outline)| {
            let color = palette.shade(ShadeKey::new(i, rung + 1))?;
            Some(Paint {
                color: color.to_rgba(),
                edges: edges(outline, sx, sy, height),
            })
        })
        .collect();

    let done = AtomicUsize::new(0);
    let total = out_h as usize;
    image
        .par_chunks_mut(out_w as usize * 4)
        .enumerate()
        .for_each_init(Vec::new, |crossings, (y, row)| {
            for paint in &paints {
                fill_row(row, y, paint, crossings);
            }
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress(0.5 + 0.5 * finished as f64 / total as f64);
        });

    log::info!(
        "rendered {out_w}x{out_h} preview of {} outlines in {:.2?}",
        paints.len(),
        start.elapsed()
    );
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use image::Rgba;
    use lithochrome_blend::{build_shades, classify, Filament, Rgb};
    use lithochrome_contour::{extract_layers, merge_downward, no_progress, worker_pool, ContourSettings};
    use std::sync::Mutex;

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

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]])
    }

    #[test]
    fn test_output_size() {
        let settings = RenderSettings::default();
        assert_eq!(settings.output_size(400, 200), (2048, 1024));
        assert_eq!(settings.output_size(0, 10), (0, 0));
        assert_eq!(RenderSettings::from_physical(100.0, 10.0).longest_side, 1000);
        assert_eq!(RenderSettings::from_physical(0.0, 10.0).longest_side, 1);
    }

    #[test]
    fn test_squares_paint_exact_pixels() {
        let palette = black_white();
        let stack: LayerStack = vec![
            vec![square(0.0, 0.0, 10.0)],
            vec![square(2.0, 2.0, 4.0), MultiPolygon::new(Vec::new())],
        ];
        let settings = RenderSettings { longest_side: 10 };
        let image = render_preview(&stack, &palette, 10, 10, &settings, &no_progress);
        assert_eq!(image.dimensions(), (10, 10));

        let gray = Rgba(palette.shade(ShadeKey::new(1, 1)).unwrap().to_rgba());
        let black = Rgba([0, 0, 0, 255]);
        // Y-up rows 2..6 are image rows 4..8.
        for y in 0..10 {
            for x in 0..10 {
                let inside = (2..6).contains(&x) && (4..8).contains(&y);
                let expected = if inside { gray } else { black };
                assert_eq!(*image.get_pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_hole_stays_uncovered() {
        let palette = black_white();
        let outer = polygon![(x: 0.0, y: 0.0), (x: 8.0, y: 0.0), (x: 8.0, y: 8.0), (x: 0.0, y: 8.0)];
        let hole = polygon![(x: 2.0, y: 2.0), (x: 6.0, y: 2.0), (x: 6.0, y: 6.0), (x: 2.0, y: 6.0)];
        let ring = geo::Polygon::new(outer.exterior().clone(), vec![hole.exterior().clone()]);
        let stack: LayerStack = vec![vec![MultiPolygon::new(vec![ring])], vec![]];
        let image = render_preview(&stack, &palette, 8, 8, &RenderSettings { longest_side: 8 }, &no_progress);
        assert_eq!(image.get_pixel(4, 4)[3], 0);
        assert_eq!(image.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_preview_only_uses_palette_colors() {
        let palette = black_white();
        let source = RgbaImage::from_fn(24, 18, |x, y| {
            let d = ((x as f64 - 12.0).powi(2) + (y as f64 - 9.0).powi(2)).sqrt();
            if d > 11.0 {
                Rgba([0, 0, 0, 0])
            } else {
                let v = (255.0 - d * 20.0).max(0.0) as u8;
                Rgba([v, v, v, 255])
            }
        });
        let classified = classify(&source, &palette);
        let pool = worker_pool(Some(2)).unwrap();
        let settings = ContourSettings {
            min_area: 0.5,
            ..Default::default()
        };
        let stack = merge_downward(&extract_layers(&classified, &palette, &settings, &pool, &no_progress));

        let reported = Mutex::new(Vec::new());
        let record = |p: f64| reported.lock().unwrap().push(p);
        let image = render_preview(&stack, &palette, 24, 18, &RenderSettings { longest_side: 96 }, &record);
        assert_eq!(image.dimensions(), (96, 72));

        let index = palette.index();
        let mut painted = 0;
        for px in image.pixels() {
            if px[3] == 0 {
                continue;
            }
            painted += 1;
            assert_eq!(px[3], 255);
            assert!(index.contains_key(&Rgb::new(px[0], px[1], px[2])), "{px:?}");
        }
        assert!(painted > 0);

        let reported = reported.into_inner().unwrap();
        assert_eq!(reported.len(), 72);
        assert!(reported.iter().all(|&p| (0.5..=1.0).contains(&p)));
        assert!(reported.iter().any(|&p| p == 1.0));
    }

    #[test]
    fn test_empty_stack_is_transparent() {
        let palette = black_white();
        let stack: LayerStack = vec![vec![MultiPolygon::new(Vec::new())], vec![]];
        let image = render_preview(&stack, &palette, 5, 5, &RenderSettings { longest_side: 5 }, &no_progress);
        assert!(image.pixels().all(|p| p[3] == 0));
    }
}
