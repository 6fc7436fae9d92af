//! Line dithering of a single layer.
//!
//! A dithered layer covers only a fraction of the pixel area with one
//! filament. Lines rather than scattered dots keep the pattern printable.

use serde::{Deserialize, Serialize};

use crate::model::composite;
use crate::rgb::Rgb;

/// Area fractions tried when searching for a dither.
pub const DITHER_RATIOS: [f64; 7] = [0.125, 0.25, 0.375, 0.5, 0.625, 0.75, 0.875];

/// Smallest tile edge in pixels. Every ratio in [`DITHER_RATIOS`] is exact
/// on a multiple of this.
pub const MIN_PATTERN_SIZE: usize = 8;

/// Largest tile edge in pixels.
pub const MAX_PATTERN_SIZE: usize = 1024;

/// Line orientation of a dither pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DitherPattern {
    /// Full-width rows.
    #[default]
    Horizontal,
    /// Full-height columns.
    Vertical,
}

impl DitherPattern {
    /// Both orientations, horizontal first.
    pub const ALL: [DitherPattern; 2] = [DitherPattern::Horizontal, DitherPattern::Vertical];
}

/// Effective colour of `color` dithered over `base` at the given coverage.
pub fn dither_blend(base: Rgb, color: Rgb, alpha: f64, ratio: f64) -> Rgb {
    if ratio <= 0.0 {
        return base;
    }
    let covered = composite(base, color, alpha);
    if ratio >= 1.0 {
        return covered;
    }
    composite(base, covered, ratio)
}

/// Square `size × size` tile, row-major, `true` where the dither filament goes.
///
/// The tile is split into [`MIN_PATTERN_SIZE`] bands; a band is on when the
/// running coverage `floor(band · ratio)` steps up, which spreads the lines
/// evenly and hits the requested ratio exactly.
pub fn dither_mask(size: usize, ratio: f64, pattern: DitherPattern) -> Vec<bool> {
    if ratio <= 0.0 || size == 0 {
        return vec![false; size * size];
    }
    if ratio >= 1.0 {
        return vec![true; size * size];
    }
    let band = (size / MIN_PATTERN_SIZE).max(1);
    let line_on = |i: usize| {
        let j = (i / band) as f64;
        ((j + 1.0) * ratio).floor() > (j * ratio).floor()
    };
    let lines: Vec<bool> = (0..size).map(line_on).collect();

    let mut mask = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            mask.push(match pattern {
                DitherPattern::Horizontal => lines[y],
                DitherPattern::Vertical => lines[x],
            });
        }
    }
    mask
}

/// Tile edge in pixels for an image printed at `max_size_mm` on its longer
/// side with lines no thinner than `line_width` mm.
///
/// Without both physical values the tile is [`MIN_PATTERN_SIZE`]. Lines
/// wider than the tile allows are capped at [`MAX_PATTERN_SIZE`].
pub fn pattern_size(width: u32, height: u32, max_size_mm: Option<f64>, line_width: Option<f64>) -> usize {
    let longer = width.max(height);
    match (max_size_mm, line_width) {
        (Some(size), Some(line)) if size > 0.0 && line > 0.0 && longer > 0 => {
            let pixel_mm = size / f64::from(longer);
            // One band must be at least one line wide.
            let max_band = (MAX_PATTERN_SIZE / MIN_PATTERN_SIZE) as f64;
            let band_px = (line / pixel_mm).ceil().clamp(1.0, max_band) as usize;
            (band_px * MIN_PATTERN_SIZE).next_power_of_two().min(MAX_PATTERN_SIZE)
        }
        _ => MIN_PATTERN_SIZE,
    }
}
