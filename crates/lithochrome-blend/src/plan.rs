//! Layer plans for the per-pixel search mode.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::cache::{fingerprint, CacheKey, SequenceCache};
use crate::dither::{dither_mask, pattern_size, DitherPattern};
use crate::error::{ConfigError, Result};
use crate::model::alpha_from_thickness;
use crate::rgb::Rgb;
use crate::search::{solve, ColorSolution, PaletteFilament, SearchSettings};

/// One pixel of a dithered layer that received the dither filament.
#[derive(Debug, Clone, PartialEq)]
pub struct DitherMark {
    /// Pixel column.
    pub x: u32,
    /// Pixel row.
    pub y: u32,
    /// Layer index in the plan.
    pub layer: usize,
    /// Dither filament.
    pub filament: usize,
    /// Area fraction of the dither.
    pub ratio: f64,
    /// Line orientation.
    pub pattern: DitherPattern,
}

/// Filament assignment of every pixel in every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlan {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Substrate filament index.
    pub substrate: usize,
    /// Whether columns were flipped for face-down printing.
    pub face_down: bool,
    /// Row-major mask of pixels that are printed at all.
    pub opaque: Vec<bool>,
    /// `layers[layer][y * width + x]`, bottom layer first.
    pub layers: Vec<Vec<Option<usize>>>,
    /// Pixels that carry a dither filament.
    pub dithered: Vec<DitherMark>,
}

impl LayerPlan {
    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Filament at one layer of one pixel.
    pub fn at(&self, layer: usize, x: u32, y: u32) -> Option<usize> {
        let i = self.index(x, y)?;
        self.layers.get(layer)?[i]
    }

    /// Filaments of one pixel, bottom first.
    pub fn column(&self, x: u32, y: u32) -> Vec<usize> {
        match self.index(x, y) {
            Some(i) => self.layers.iter().filter_map(|layer| layer[i]).collect(),
            None => Vec::new(),
        }
    }

    /// Filaments present in a layer, ascending.
    pub fn filaments_in_layer(&self, layer: usize) -> Vec<usize> {
        let Some(cells) = self.layers.get(layer) else {
            return Vec::new();
        };
        cells.iter().flatten().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// Row-major mask of pixels assigned `filament` in `layer`.
    pub fn occupancy(&self, layer: usize, filament: usize) -> Vec<bool> {
        match self.layers.get(layer) {
            Some(cells) => cells.iter().map(|c| *c == Some(filament)).collect(),
            None => vec![false; self.opaque.len()],
        }
    }
}

/// Layer for a dither over a base of `base_len` layers, if the placement
/// rules allow one.
///
/// `earlier` lists layers of the same pixel that are already dithered.
fn dither_slot(base_len: usize, budget: usize, settings: &SearchSettings, earlier: &[usize]) -> Option<usize> {
    let slot = base_len;
    if slot >= budget {
        return None;
    }
    if !settings.allow_top_layer_dithering && slot + 1 >= budget {
        return None;
    }
    let gap = settings.min_layers_between_dithering as usize;
    if gap > 0 && earlier.iter().any(|&e| slot.abs_diff(e) <= gap) {
        return None;
    }
    Some(slot)
}

/// Assign filaments to every opaque pixel of `image`.
///
/// Colours missing from `cache` are solved in parallel and then stored by
/// this thread. Transparent pixels get no layers.
pub fn plan_layers(
    image: &RgbaImage,
    filaments: &[PaletteFilament],
    settings: &SearchSettings,
    cache: &mut SequenceCache,
) -> Result<LayerPlan> {
    settings.validate(filaments)?;
    let substrate = settings
        .resolve_substrate(filaments)
        .ok_or(ConfigError::NoFilaments)?;
    let start = Instant::now();
    let (width, height) = image.dimensions();
    let print = fingerprint(filaments);

    let targets: BTreeSet<Rgb> = image
        .pixels()
        .filter(|p| p[3] != 0)
        .map(|p| Rgb::new(p[0], p[1], p[2]))
        .collect();
    let missing: Vec<Rgb> = targets
        .iter()
        .copied()
        .filter(|&t| !cache.contains(&CacheKey::new(t, print, settings)))
        .collect();
    let solved: Vec<(Rgb, ColorSolution)> = missing
        .par_iter()
        .map(|&t| (t, solve(t, filaments, settings)))
        .collect();
    for (t, solution) in solved {
        cache.insert(CacheKey::new(t, print, settings), solution);
    }
    log::info!(
        "solved {} of {} unique colours in {:.2?}",
        missing.len(),
        targets.len(),
        start.elapsed()
    );

    let budget = settings.max_layers as usize;
    let backing = if settings.face_down {
        settings.substrate_layers as usize
    } else {
        0
    };
    let tile = pattern_size(width, height, settings.max_size_mm, settings.line_width);
    let mut masks: HashMap<(u64, DitherPattern), Vec<bool>> = HashMap::new();

    let pixels = width as usize * height as usize;
    let mut layers = vec![vec![None; pixels]; budget + backing];
    let mut opaque = vec![false; pixels];
    let mut dithered = Vec::new();

    for (x, y, px) in image.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        let idx = y as usize * width as usize + x as usize;
        opaque[idx] = true;
        let key = CacheKey::new(Rgb::new(px[0], px[1], px[2]), print, settings);
        let Some(solution) = cache.get(&key) else {
            continue;
        };

        let base = solution.base_sequence();
        let mut column: Vec<usize> = base.iter().copied().take(budget).collect();
        let mut dither_at = None;
        if let Some(choice) = solution.dither() {
            if let Some(slot) = dither_slot(column.len(), budget, settings, &[]) {
                let mask = masks
                    .entry((choice.ratio.to_bits(), choice.pattern))
                    .or_insert_with(|| dither_mask(tile, choice.ratio, choice.pattern));
                let tx = x as usize % tile;
                let ty = y as usize % tile;
                if mask[ty * tile + tx] {
                    column.push(choice.filament);
                    dither_at = Some((slot, *choice));
                }
                if !settings.allow_top_layer_dithering {
                    // With no base layers the substrate shows through, so it caps the dither.
                    column.push(base.last().copied().unwrap_or(substrate));
                }
            }
        }

        if settings.face_down {
            column.reverse();
            column.extend(std::iter::repeat(substrate).take(backing));
        }
        if let Some((slot, choice)) = dither_at {
            let layer = if settings.face_down {
                column.len() - backing - 1 - slot
            } else {
                slot
            };
            dithered.push(DitherMark {
                x,
                y,
                layer,
                filament: choice.filament,
                ratio: choice.ratio,
                pattern: choice.pattern,
            });
        }
        for (layer, filament) in column.into_iter().enumerate() {
            layers[layer][idx] = Some(filament);
        }
    }

    log::debug!(
        "planned {} layers for {}x{} pixels, {} dithered",
        layers.len(),
        width,
        height,
        dithered.len()
    );
    Ok(LayerPlan {
        width,
        height,
        substrate,
        face_down: settings.face_down,
        opaque,
        layers,
        dithered,
    })
}

/// Predicted appearance of a printed plan, viewed from the image side.
pub fn simulate_print(plan: &LayerPlan, filaments: &[PaletteFilament], settings: &SearchSettings) -> RgbaImage {
    let alphas: Vec<f64> = filaments
        .iter()
        .map(|f| alpha_from_thickness(settings.layer_height, f.transmission_distance))
        .collect();
    let base = filaments
        .get(plan.substrate)
        .map(|f| f.color)
        .unwrap_or_default();

    RgbaImage::from_fn(plan.width, plan.height, |x, y| {
        let idx = y as usize * plan.width as usize + x as usize;
        if !plan.opaque[idx] {
            return Rgba([0, 0, 0, 0]);
        }
        let mut column = plan.column(x, y);
        if plan.face_down {
            column.reverse();
        }
        let mut c = base.channels().map(f64::from);
        for i in column {
            let (Some(f), Some(&a)) = (filaments.get(i), alphas.get(i)) else {
                continue;
            };
            let top = f.color.channels();
            for ch in 0..3 {
                c[ch] = c[ch] * (1.0 - a) + f64::from(top[ch]) * a;
            }
        }
        let px = c.map(|v| v.round().clamp(0.0, 255.0) as u8);
        Rgba([px[0], px[1], px[2], 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque_palette() -> Vec<PaletteFilament> {
        vec![
            PaletteFilament::new("white", Rgb::WHITE, 0.0),
            PaletteFilament::new("red", Rgb::new(255, 0, 0), 0.0),
            PaletteFilament::new("black", Rgb::BLACK, 0.0),
        ]
    }

    fn flat(w: u32, h: u32, c: Rgb) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(c.to_rgba()))
    }

    #[test]
    fn test_substrate_colour_needs_no_layers() {
        let mut cache = SequenceCache::new();
        let settings = SearchSettings::default();
        let plan = plan_layers(&flat(3, 2, Rgb::WHITE), &opaque_palette(), &settings, &mut cache).unwrap();
        assert_eq!(plan.layer_count(), 5);
        assert!(plan.opaque.iter().all(|&o| o));
        assert!(plan.layers.iter().flatten().all(Option::is_none));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_face_down_reverses_and_backs_with_substrate() {
        let mut cache = SequenceCache::new();
        let settings = SearchSettings {
            face_down: true,
            substrate_layers: 2,
            ..Default::default()
        };
        let plan = plan_layers(&flat(1, 1, Rgb::BLACK), &opaque_palette(), &settings, &mut cache).unwrap();
        assert_eq!(plan.layer_count(), 7);
        assert_eq!(plan.column(0, 0), vec![2, 0, 0]);
        assert_eq!(plan.at(0, 0, 0), Some(2));
        assert_eq!(plan.at(3, 0, 0), None);
    }

    #[test]
    fn test_dither_without_base_layers_is_capped() {
        let mut cache = SequenceCache::new();
        let filaments = vec![
            PaletteFilament::new("white", Rgb::WHITE, 0.0),
            PaletteFilament::new("black", Rgb::BLACK, 0.0),
        ];
        let settings = SearchSettings::default();
        let plan = plan_layers(&flat(8, 8, Rgb::new(128, 128, 128)), &filaments, &settings, &mut cache).unwrap();
        assert_eq!(plan.dithered.len(), 32);
        assert_eq!(plan.occupancy(0, 1).iter().filter(|&&b| b).count(), 32);
        assert!(plan.dithered.iter().all(|m| m.layer == 0 && m.filament == 1));
        // Odd rows carry the lines at ratio 0.5, under a substrate cap.
        assert_eq!(plan.column(0, 1), vec![1, 0]);
        assert_eq!(plan.column(0, 0), vec![0]);
        for mark in &plan.dithered {
            let column = plan.column(mark.x, mark.y);
            assert!(column.len() > mark.layer + 1, "dither at ({}, {}) is uncovered", mark.x, mark.y);
        }

        let settings = SearchSettings {
            allow_top_layer_dithering: true,
            ..Default::default()
        };
        let plan = plan_layers(&flat(8, 8, Rgb::new(128, 128, 128)), &filaments, &settings, &mut cache).unwrap();
        assert_eq!(plan.column(0, 1), vec![1]);
        assert!(plan.column(0, 0).is_empty());
    }

    #[test]
    fn test_no_room_for_dither_below_top() {
        let mut cache = SequenceCache::new();
        let filaments = vec![
            PaletteFilament::new("white", Rgb::WHITE, 0.0),
            PaletteFilament::new("black", Rgb::BLACK, 0.0),
        ];
        let settings = SearchSettings {
            max_layers: 1,
            ..Default::default()
        };
        let plan = plan_layers(&flat(8, 8, Rgb::new(128, 128, 128)), &filaments, &settings, &mut cache).unwrap();
        assert!(plan.dithered.is_empty());
        assert!(plan.layers.iter().flatten().all(Option::is_none));

        let settings = SearchSettings {
            max_layers: 1,
            allow_top_layer_dithering: true,
            ..Default::default()
        };
        let plan = plan_layers(&flat(8, 8, Rgb::new(128, 128, 128)), &filaments, &settings, &mut cache).unwrap();
        assert_eq!(plan.dithered.len(), 32);
    }

    #[test]
    fn test_protective_layer_covers_dither() {
        let mut cache = SequenceCache::new();
        let settings = SearchSettings::default();
        let plan = plan_layers(&flat(8, 8, Rgb::new(128, 0, 0)), &opaque_palette(), &settings, &mut cache).unwrap();
        assert_eq!(plan.column(0, 1), vec![1, 2, 1]);
        assert_eq!(plan.column(0, 0), vec![1, 1]);
        assert!(plan.dithered.iter().all(|m| m.layer == 1));
        assert_eq!(plan.filaments_in_layer(1), vec![1, 2]);
    }

    #[test]
    fn test_dither_slot_spacing() {
        let settings = SearchSettings {
            min_layers_between_dithering: 2,
            ..Default::default()
        };
        assert_eq!(dither_slot(1, 5, &settings, &[]), Some(1));
        assert_eq!(dither_slot(3, 5, &settings, &[1]), None);
        assert_eq!(dither_slot(3, 6, &settings, &[0]), Some(3));
        assert_eq!(dither_slot(4, 5, &settings, &[]), None);
    }

    #[test]
    fn test_transparent_pixels_stay_empty() {
        let mut cache = SequenceCache::new();
        let mut image = flat(2, 1, Rgb::BLACK);
        image.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let settings = SearchSettings::default();
        let filaments = opaque_palette();
        let plan = plan_layers(&image, &filaments, &settings, &mut cache).unwrap();
        assert_eq!(plan.opaque, vec![true, false]);
        assert!(plan.column(1, 0).is_empty());

        let sim = simulate_print(&plan, &filaments, &settings);
        assert_eq!(sim.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(sim.get_pixel(1, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_simulation_matches_in_both_orientations() {
        let filaments = vec![
            PaletteFilament::new("white", Rgb::WHITE, 6.0),
            PaletteFilament::new("teal", Rgb::new(0, 128, 128), 3.0),
        ];
        let target = Rgb::new(60, 160, 160);
        let mut cache = SequenceCache::new();
        let up = SearchSettings::default();
        let down = SearchSettings {
            face_down: true,
            ..Default::default()
        };
        let a = plan_layers(&flat(2, 2, target), &filaments, &up, &mut cache).unwrap();
        let b = plan_layers(&flat(2, 2, target), &filaments, &down, &mut cache).unwrap();
        assert_eq!(simulate_print(&a, &filaments, &up), simulate_print(&b, &filaments, &down));
    }
}
