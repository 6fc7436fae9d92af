//! Shade ladders: every colour the layered print can show.
//!
//! Filament 0 contributes its own colour. Each later filament is stacked on
//! top of the last shade of the filament before it, one ladder rung
//! per layer count.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::filament::Filament;
use crate::model::{composite, stacked_alpha};
use crate::rgb::Rgb;

/// Identifies one achievable shade: `layers` stacked layers of `filament`.
///
/// `layers` is 1-based. The substrate's single shade is `(0, 1)`.
/// Ordering is print order: by filament, then by layer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShadeKey {
    /// Filament index.
    pub filament: usize,
    /// Number of stacked layers, at least 1.
    pub layers: usize,
}

impl ShadeKey {
    /// Create a key.
    pub const fn new(filament: usize, layers: usize) -> Self {
        Self { filament, layers }
    }
}

/// All shades, indexed `[filament][layers - 1]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShadePalette {
    ladders: Vec<Vec<Rgb>>,
}

impl ShadePalette {
    /// Wrap precomputed ladders.
    pub fn from_ladders(ladders: Vec<Vec<Rgb>>) -> Self {
        Self { ladders }
    }

    /// Ladders per filament.
    pub fn ladders(&self) -> &[Vec<Rgb>] {
        &self.ladders
    }

    /// Number of filaments.
    pub fn filament_count(&self) -> usize {
        self.ladders.len()
    }

    /// Ladder of one filament.
    pub fn ladder(&self, filament: usize) -> Option<&[Rgb]> {
        self.ladders.get(filament).map(Vec::as_slice)
    }

    /// Colour of a shade.
    pub fn shade(&self, key: ShadeKey) -> Option<Rgb> {
        let rung = key.layers.checked_sub(1)?;
        self.ladders.get(key.filament)?.get(rung).copied()
    }

    /// Total number of shades.
    pub fn len(&self) -> usize {
        self.ladders.iter().map(Vec::len).sum()
    }

    /// True if there are no shades.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shades in flattened order: lowest filament first, then lowest layer count.
    pub fn iter(&self) -> impl Iterator<Item = (ShadeKey, Rgb)> + '_ {
        self.ladders.iter().enumerate().flat_map(|(filament, ladder)| {
            ladder
                .iter()
                .enumerate()
                .map(move |(rung, &c)| (ShadeKey::new(filament, rung + 1), c))
        })
    }

    /// [`iter`](Self::iter) collected.
    pub fn flatten(&self) -> Vec<(ShadeKey, Rgb)> {
        self.iter().collect()
    }

    /// Shade that owns an exact colour.
    ///
    /// Several shades may share one RGB value; the first in flattened order
    /// owns it.
    pub fn lookup(&self, c: Rgb) -> Option<ShadeKey> {
        self.iter().find(|&(_, s)| s == c).map(|(k, _)| k)
    }

    /// Colour to owning shade map, following the same ownership rule as
    /// [`lookup`](Self::lookup).
    pub fn index(&self) -> HashMap<Rgb, ShadeKey> {
        let mut index = HashMap::with_capacity(self.len());
        for (key, c) in self.iter() {
            index.entry(c).or_insert(key);
        }
        index
    }
}

/// Check a filament list and layer height the way [`build_shades`] does.
pub fn validate_filaments(filaments: &[Filament], layer_height: f64) -> Result<()> {
    if filaments.is_empty() {
        return Err(ConfigError::NoFilaments);
    }
    if !layer_height.is_finite() || layer_height <= 0.0 {
        return Err(ConfigError::InvalidLayerHeight(layer_height));
    }
    for (i, f) in filaments.iter().enumerate().skip(1) {
        if f.max_layers < 1 {
            return Err(ConfigError::InvalidLayerCount {
                filament: i,
                max_layers: f.max_layers,
            });
        }
    }
    Ok(())
}

/// Build the shade ladder of every filament.
pub fn build_shades(filaments: &[Filament], layer_height: f64) -> Result<ShadePalette> {
    validate_filaments(filaments, layer_height)?;

    let mut ladders: Vec<Vec<Rgb>> = Vec::with_capacity(filaments.len());
    ladders.push(vec![filaments[0].color]);

    for f in &filaments[1..] {
        let start = ladders
            .last()
            .and_then(|l| l.last())
            .copied()
            .unwrap_or(filaments[0].color);
        let alpha = f.alpha(layer_height);
        let ladder = (1..=f.max_layers)
            .map(|layers| composite(start, f.color, stacked_alpha(alpha, layers)))
            .collect();
        ladders.push(ladder);
    }

    log::debug!(
        "built {} shades for {} filaments at {} mm",
        ladders.iter().map(Vec::len).sum::<usize>(),
        filaments.len(),
        layer_height
    );
    Ok(ShadePalette::from_ladders(ladders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rgb_distance;

    fn black_white() -> Vec<Filament> {
        vec![
            Filament::new(Rgb::BLACK, 0.0, 1),
            Filament::new(Rgb::WHITE, 7.5, 5),
        ]
    }

    #[test]
    fn test_black_white_ladder() {
        let palette = build_shades(&black_white(), 0.2).unwrap();
        assert_eq!(palette.filament_count(), 2);
        assert_eq!(palette.ladder(0).unwrap(), &[Rgb::BLACK]);

        let grays: Vec<u8> = palette.ladder(1).unwrap().iter().map(|c| c.r).collect();
        assert_eq!(grays, vec![128, 191, 223, 239, 247]);
        for c in palette.ladder(1).unwrap() {
            assert!(c.r == c.g && c.g == c.b);
        }
    }

    #[test]
    fn test_ladder_converges_to_filament_colour() {
        let filaments = vec![
            Filament::new(Rgb::new(240, 240, 230), 0.0, 1),
            Filament::new(Rgb::new(200, 30, 40), 3.0, 6),
            Filament::new(Rgb::new(20, 40, 180), 1.5, 8),
        ];
        let palette = build_shades(&filaments, 0.12).unwrap();
        for (i, f) in filaments.iter().enumerate().skip(1) {
            let ladder = palette.ladder(i).unwrap();
            assert_eq!(ladder.len(), f.max_layers as usize);
            for pair in ladder.windows(2) {
                assert!(rgb_distance(pair[1], f.color) <= rgb_distance(pair[0], f.color));
            }
        }
    }

    #[test]
    fn test_top_rung_is_much_closer_than_first() {
        let channel_gap = |a: Rgb, b: Rgb| -> i32 {
            a.channels()
                .iter()
                .zip(b.channels())
                .map(|(&x, y)| (i32::from(x) - i32::from(y)).abs())
                .sum()
        };
        let pairs = [
            (Rgb::BLACK, Rgb::new(250, 220, 120)),
            (Rgb::new(20, 30, 60), Rgb::new(255, 140, 0)),
            (Rgb::WHITE, Rgb::new(30, 90, 160)),
        ];
        for (substrate, color) in pairs {
            let filaments = vec![Filament::new(substrate, 0.0, 1), Filament::new(color, 7.5, 5)];
            let palette = build_shades(&filaments, 0.2).unwrap();
            let ladder = palette.ladder(1).unwrap();
            let gaps: Vec<i32> = ladder.iter().map(|&c| channel_gap(c, color)).collect();
            for pair in gaps.windows(2) {
                assert!(pair[1] <= pair[0], "{color}: {gaps:?}");
            }
            assert!(gaps[0] - gaps[4] >= 50, "{color}: {gaps:?}");
        }
    }

    #[test]
    fn test_each_ladder_starts_from_previous_top() {
        let filaments = vec![
            Filament::new(Rgb::WHITE, 0.0, 1),
            Filament::new(Rgb::new(255, 0, 0), 0.0, 2),
            Filament::new(Rgb::new(0, 0, 255), 100.0, 1),
        ];
        let palette = build_shades(&filaments, 0.2).unwrap();
        // Opaque red covers white completely.
        assert_eq!(palette.ladder(1).unwrap(), &[Rgb::new(255, 0, 0); 2]);
        let blue_over_red = palette.shade(ShadeKey::new(2, 1)).unwrap();
        assert!(blue_over_red.r > 200 && blue_over_red.b < 60);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(build_shades(&[], 0.2), Err(ConfigError::NoFilaments));
        assert_eq!(
            build_shades(&black_white(), 0.0),
            Err(ConfigError::InvalidLayerHeight(0.0))
        );
        let mut filaments = black_white();
        filaments[1].max_layers = 0;
        assert_eq!(
            build_shades(&filaments, 0.2),
            Err(ConfigError::InvalidLayerCount {
                filament: 1,
                max_layers: 0
            })
        );
        // The substrate's layer count is not used.
        let mut filaments = black_white();
        filaments[0].max_layers = 0;
        assert!(build_shades(&filaments, 0.2).is_ok());
    }

    #[test]
    fn test_shade_and_flatten() {
        let palette = build_shades(&black_white(), 0.2).unwrap();
        assert_eq!(palette.len(), 6);
        assert_eq!(palette.shade(ShadeKey::new(0, 1)), Some(Rgb::BLACK));
        assert_eq!(palette.shade(ShadeKey::new(1, 0)), None);
        assert_eq!(palette.shade(ShadeKey::new(1, 6)), None);
        assert_eq!(palette.shade(ShadeKey::new(2, 1)), None);

        let flat = palette.flatten();
        assert_eq!(flat[0].0, ShadeKey::new(0, 1));
        assert_eq!(flat[5], (ShadeKey::new(1, 5), Rgb::new(247, 247, 247)));
    }

    #[test]
    fn test_lookup_lowest_owner_wins() {
        let filaments = vec![
            Filament::new(Rgb::WHITE, 0.0, 1),
            Filament::new(Rgb::WHITE, 0.0, 3),
            Filament::new(Rgb::WHITE, 0.0, 2),
        ];
        let palette = build_shades(&filaments, 0.2).unwrap();
        assert_eq!(palette.lookup(Rgb::WHITE), Some(ShadeKey::new(0, 1)));
        assert_eq!(palette.index()[&Rgb::WHITE], ShadeKey::new(0, 1));

        let palette = ShadePalette::from_ladders(vec![
            vec![Rgb::BLACK],
            vec![Rgb::new(9, 9, 9), Rgb::new(50, 50, 50)],
            vec![Rgb::new(50, 50, 50)],
        ]);
        assert_eq!(palette.lookup(Rgb::new(50, 50, 50)), Some(ShadeKey::new(1, 2)));
        assert_eq!(palette.lookup(Rgb::new(1, 2, 3)), None);
    }
}
