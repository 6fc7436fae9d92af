//! Memo of solved target colours.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::rgb::Rgb;
use crate::search::{solve, ColorSolution, PaletteFilament, SearchSettings};

/// Fingerprint of a filament palette.
///
/// Solutions refer to filaments by index, so the order is part of it.
pub fn fingerprint(filaments: &[PaletteFilament]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for f in filaments {
        f.name.hash(&mut hasher);
        f.color.hash(&mut hasher);
        f.transmission_distance.to_bits().hash(&mut hasher);
        f.max_uses.hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    target: Rgb,
    fingerprint: u64,
    substrate: Option<usize>,
    layer_height_bits: u64,
    max_layers: u32,
    dither_bits: (u64, u64),
}

impl CacheKey {
    pub(crate) fn new(target: Rgb, fingerprint: u64, settings: &SearchSettings) -> Self {
        Self {
            target,
            fingerprint,
            substrate: settings.substrate,
            layer_height_bits: settings.layer_height.to_bits(),
            max_layers: settings.max_layers,
            dither_bits: (
                settings.dither_trigger.to_bits(),
                settings.min_dither_gain.to_bits(),
            ),
        }
    }
}

/// Solutions keyed by target colour, palette and search settings.
///
/// Owned by the caller. Clear it when switching palettes to release memory;
/// stale entries are never returned for a different palette since the
/// palette fingerprint is part of the key.
#[derive(Debug, Default)]
pub struct SequenceCache {
    entries: HashMap<CacheKey, ColorSolution>,
}

impl SequenceCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached solution, computing and storing it on a miss.
    pub fn get_or_solve(
        &mut self,
        target: Rgb,
        filaments: &[PaletteFilament],
        settings: &SearchSettings,
    ) -> ColorSolution {
        let key = CacheKey::new(target, fingerprint(filaments), settings);
        self.entries
            .entry(key)
            .or_insert_with(|| solve(target, filaments, settings))
            .clone()
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<&ColorSolution> {
        self.entries.get(key)
    }

    pub(crate) fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: CacheKey, solution: ColorSolution) {
        self.entries.insert(key, solution);
    }

    /// Number of cached solutions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        log::debug!("sequence cache cleared ({dropped} entries)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Vec<PaletteFilament> {
        vec![
            PaletteFilament::new("white", Rgb::WHITE, 4.0),
            PaletteFilament::new("cyan", Rgb::new(0, 160, 220), 2.5),
        ]
    }

    #[test]
    fn test_get_or_solve_memoizes() {
        let mut cache = SequenceCache::new();
        let settings = SearchSettings::default();
        let target = Rgb::new(40, 140, 200);
        let first = cache.get_or_solve(target, &palette(), &settings);
        let second = cache.get_or_solve(target, &palette(), &settings);
        assert_eq!(first, second);
        assert_eq!(first, solve(target, &palette(), &settings));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_separates_palettes_and_settings() {
        let mut cache = SequenceCache::new();
        let settings = SearchSettings::default();
        let target = Rgb::new(40, 140, 200);
        cache.get_or_solve(target, &palette(), &settings);

        let mut other = palette();
        other[1].transmission_distance = 1.0;
        cache.get_or_solve(target, &other, &settings);

        let taller = SearchSettings {
            max_layers: 7,
            ..settings.clone()
        };
        cache.get_or_solve(target, &palette(), &taller);
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_order() {
        let mut reversed = palette();
        assert_eq!(fingerprint(&palette()), fingerprint(&reversed));
        reversed.reverse();
        assert_ne!(fingerprint(&palette()), fingerprint(&reversed));
    }
}
