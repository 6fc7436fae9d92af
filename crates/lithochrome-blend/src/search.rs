//! Per-pixel greedy search for a stack of filament layers.
//!
//! Unlike shade ladders, this mode treats the filaments as an unordered
//! palette: every pixel gets its own sequence, chosen one layer at a time.

use serde::{Deserialize, Serialize};

use crate::dither::{dither_blend, DitherPattern, DITHER_RATIOS};
use crate::error::{ConfigError, Result};
use crate::model::{alpha_from_thickness, composite, rgb_distance};
use crate::rgb::Rgb;

/// A target whose channel sum exceeds this may start from the brightest
/// filament instead of the substrate.
const BRIGHT_TARGET_SUM: u32 = 600;

/// Search stops once the stack is this close to the target.
const CLOSE_ENOUGH: f64 = 2.0;

/// One entry of an unordered filament palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteFilament {
    /// Display name.
    pub name: String,
    /// Colour of a fully opaque block.
    pub color: Rgb,
    /// Transmission distance in mm.
    #[serde(alias = "td")]
    pub transmission_distance: f64,
    /// Cap on layers of this filament in one pixel's sequence.
    #[serde(default)]
    pub max_uses: Option<u32>,
}

impl PaletteFilament {
    /// Create an uncapped palette entry.
    pub fn new(name: impl Into<String>, color: Rgb, transmission_distance: f64) -> Self {
        Self {
            name: name.into(),
            color,
            transmission_distance,
            max_uses: None,
        }
    }
}

/// Search and layer placement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Layer height in mm.
    pub layer_height: f64,
    /// Layers available above the substrate.
    pub max_layers: u32,
    /// Substrate filament index; the brightest filament when unset.
    pub substrate: Option<usize>,
    /// Dithering is considered when the sequential result is farther than this.
    pub dither_trigger: f64,
    /// Dithering is used only when it beats the sequential result by more than this.
    pub min_dither_gain: f64,
    /// Allow a dithered layer to be the top of a pixel's stack.
    pub allow_top_layer_dithering: bool,
    /// Minimum plain layers between two dithered layers of one pixel.
    pub min_layers_between_dithering: u32,
    /// Print the image side on the build plate.
    pub face_down: bool,
    /// Substrate layers printed under (face up) or over (face down) the image.
    pub substrate_layers: u32,
    /// Longer image side in mm, used for dither tile sizing and meshes.
    pub max_size_mm: Option<f64>,
    /// Nozzle line width in mm, used for dither tile sizing.
    pub line_width: Option<f64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            layer_height: 0.08,
            max_layers: 5,
            substrate: None,
            dither_trigger: 5.0,
            min_dither_gain: 5.0,
            allow_top_layer_dithering: false,
            min_layers_between_dithering: 0,
            face_down: false,
            substrate_layers: 3,
            max_size_mm: None,
            line_width: None,
        }
    }
}

impl SearchSettings {
    /// Check settings against a palette.
    pub fn validate(&self, filaments: &[PaletteFilament]) -> Result<()> {
        if filaments.is_empty() {
            return Err(ConfigError::NoFilaments);
        }
        if !self.layer_height.is_finite() || self.layer_height <= 0.0 {
            return Err(ConfigError::InvalidLayerHeight(self.layer_height));
        }
        if let Some(i) = self.substrate {
            if i >= filaments.len() {
                return Err(ConfigError::InvalidSubstrate(i));
            }
        }
        if self.max_layers == 0 {
            return Err(ConfigError::InvalidSetting(
                "max_layers must be at least 1".into(),
            ));
        }
        for (name, value) in [("max_size_mm", self.max_size_mm), ("line_width", self.line_width)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(ConfigError::InvalidSetting(format!(
                        "{name} must be positive, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Substrate index: the configured one, else the brightest filament.
    ///
    /// `None` only for an empty palette. Ties go to the lowest index.
    pub fn resolve_substrate(&self, filaments: &[PaletteFilament]) -> Option<usize> {
        match self.substrate {
            Some(i) if i < filaments.len() => Some(i),
            _ => brightest(filaments),
        }
    }
}

fn brightest(filaments: &[PaletteFilament]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, f) in filaments.iter().enumerate() {
        let sum = f.color.sum();
        if best.map_or(true, |(_, s)| sum > s) {
            best = Some((i, sum));
        }
    }
    best.map(|(i, _)| i)
}

/// A partial-coverage layer chosen to finish a colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DitherChoice {
    /// Filament index.
    pub filament: usize,
    /// Fraction of the area covered.
    pub ratio: f64,
    /// Line orientation.
    pub pattern: DitherPattern,
}

/// How one target colour is printed.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSolution {
    /// Full layers only, bottom first.
    Sequential {
        /// Filament per layer.
        sequence: Vec<usize>,
    },
    /// Full layers topped by one dithered layer.
    Dithered {
        /// Filament per full layer.
        base_sequence: Vec<usize>,
        /// The dithered layer.
        dither: DitherChoice,
        /// Colour reached by the full layers.
        base_color: Rgb,
    },
}

impl ColorSolution {
    /// Full layers of the solution.
    pub fn base_sequence(&self) -> &[usize] {
        match self {
            ColorSolution::Sequential { sequence } => sequence,
            ColorSolution::Dithered { base_sequence, .. } => base_sequence,
        }
    }

    /// The dithered layer, if any.
    pub fn dither(&self) -> Option<&DitherChoice> {
        match self {
            ColorSolution::Sequential { .. } => None,
            ColorSolution::Dithered { dither, .. } => Some(dither),
        }
    }
}

/// Greedy outcome: the layers and the colour they produce.
struct Greedy {
    sequence: Vec<usize>,
    color: Rgb,
}

fn greedy(target: Rgb, filaments: &[PaletteFilament], settings: &SearchSettings) -> Greedy {
    let Some(substrate) = settings.resolve_substrate(filaments) else {
        return Greedy {
            sequence: Vec::new(),
            color: target,
        };
    };
    let alphas: Vec<f64> = filaments
        .iter()
        .map(|f| alpha_from_thickness(settings.layer_height, f.transmission_distance))
        .collect();
    let mean_alpha = alphas.iter().sum::<f64>() / alphas.len() as f64;
    let min_improvement = if mean_alpha < 0.6 {
        0.5
    } else if mean_alpha < 0.8 {
        0.8
    } else {
        1.0
    };

    let budget = settings.max_layers as usize;
    let mut uses = vec![0u32; filaments.len()];
    let mut sequence = Vec::with_capacity(budget);
    let mut current = filaments[substrate].color;

    if target.sum() > BRIGHT_TARGET_SUM {
        if let Some(bright) = brightest(filaments).filter(|&b| b != substrate) {
            let bright_color = filaments[bright].color;
            if rgb_distance(target, bright_color) < rgb_distance(target, current) && budget > 0 {
                sequence.push(bright);
                uses[bright] += 1;
                current = bright_color;
            }
        }
    }

    while sequence.len() < budget {
        let mut best: Option<(usize, f64, Rgb)> = None;
        for (i, f) in filaments.iter().enumerate() {
            if f.max_uses.is_some_and(|cap| uses[i] >= cap) {
                continue;
            }
            let candidate = composite(current, f.color, alphas[i]);
            let d = rgb_distance(target, candidate);
            if best.map_or(true, |(_, bd, _)| d < bd) {
                best = Some((i, d, candidate));
            }
        }
        let Some((pick, best_distance, next)) = best else {
            break;
        };
        let current_distance = rgb_distance(target, current);
        if current_distance < CLOSE_ENOUGH || current_distance - best_distance < min_improvement {
            break;
        }
        sequence.push(pick);
        uses[pick] += 1;
        current = next;
    }

    Greedy {
        sequence,
        color: current,
    }
}

/// Filament indices to stack over the substrate, bottom first.
///
/// Never longer than `settings.max_layers`.
pub fn color_sequence(target: Rgb, filaments: &[PaletteFilament], settings: &SearchSettings) -> Vec<usize> {
    greedy(target, filaments, settings).sequence
}

/// Best dither over `base`: lowest error, first found on ties.
fn best_dither(
    target: Rgb,
    base: Rgb,
    filaments: &[PaletteFilament],
    layer_height: f64,
) -> Option<(DitherChoice, f64)> {
    let mut best: Option<(DitherChoice, f64)> = None;
    for (i, f) in filaments.iter().enumerate() {
        let alpha = alpha_from_thickness(layer_height, f.transmission_distance);
        for ratio in DITHER_RATIOS {
            // The colour model does not depend on orientation, so horizontal
            // lines win every tie.
            for pattern in DitherPattern::ALL {
                let err = rgb_distance(target, dither_blend(base, f.color, alpha, ratio));
                if best.map_or(true, |(_, e)| err < e) {
                    best = Some((
                        DitherChoice {
                            filament: i,
                            ratio,
                            pattern,
                        },
                        err,
                    ));
                }
            }
        }
    }
    best
}

/// Choose full layers and, when they fall short, a dithered finishing layer.
pub fn solve(target: Rgb, filaments: &[PaletteFilament], settings: &SearchSettings) -> ColorSolution {
    let Greedy { sequence, color } = greedy(target, filaments, settings);
    let sequential_error = rgb_distance(target, color);

    if sequential_error > settings.dither_trigger {
        if let Some((dither, err)) = best_dither(target, color, filaments, settings.layer_height) {
            if sequential_error - err > settings.min_dither_gain {
                return ColorSolution::Dithered {
                    base_sequence: sequence,
                    dither,
                    base_color: color,
                };
            }
        }
    }
    ColorSolution::Sequential { sequence }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_black_opaque() -> Vec<PaletteFilament> {
        vec![
            PaletteFilament::new("white", Rgb::WHITE, 0.0),
            PaletteFilament::new("black", Rgb::BLACK, 0.0),
        ]
    }

    fn translucent_set() -> Vec<PaletteFilament> {
        vec![
            PaletteFilament::new("white", Rgb::WHITE, 5.0),
            PaletteFilament::new("red", Rgb::new(220, 30, 30), 2.0),
            PaletteFilament::new("blue", Rgb::new(20, 40, 200), 2.0),
            PaletteFilament::new("black", Rgb::new(10, 10, 10), 1.0),
        ]
    }

    #[test]
    fn test_target_equal_to_substrate_needs_no_layers() {
        let filaments = translucent_set();
        let seq = color_sequence(Rgb::WHITE, &filaments, &SearchSettings::default());
        assert!(seq.is_empty());
    }

    #[test]
    fn test_opaque_filament_needs_one_layer() {
        let seq = color_sequence(Rgb::BLACK, &white_black_opaque(), &SearchSettings::default());
        assert_eq!(seq, vec![1]);
    }

    #[test]
    fn test_substrate_defaults_to_brightest() {
        let filaments = translucent_set();
        assert_eq!(SearchSettings::default().resolve_substrate(&filaments), Some(0));
        let settings = SearchSettings {
            substrate: Some(3),
            ..Default::default()
        };
        assert_eq!(settings.resolve_substrate(&filaments), Some(3));
        assert_eq!(SearchSettings::default().resolve_substrate(&[]), None);
    }

    #[test]
    fn test_sequence_moves_toward_target() {
        let filaments = translucent_set();
        let settings = SearchSettings::default();
        let target = Rgb::new(120, 30, 60);
        let Greedy { sequence, color } = greedy(target, &filaments, &settings);
        assert!(!sequence.is_empty());
        assert!(sequence.len() <= settings.max_layers as usize);
        assert!(rgb_distance(target, color) < rgb_distance(target, Rgb::WHITE));
    }

    #[test]
    fn test_max_uses_respected() {
        let mut filaments = translucent_set();
        filaments[3].max_uses = Some(1);
        let settings = SearchSettings {
            max_layers: 8,
            ..Default::default()
        };
        let seq = color_sequence(Rgb::BLACK, &filaments, &settings);
        assert!(seq.iter().filter(|&&i| i == 3).count() <= 1);
    }

    #[test]
    fn test_bright_start_from_brightest() {
        let filaments = vec![
            PaletteFilament::new("white", Rgb::WHITE, 0.0),
            PaletteFilament::new("gray", Rgb::new(60, 60, 60), 0.0),
        ];
        let settings = SearchSettings {
            substrate: Some(1),
            ..Default::default()
        };
        let seq = color_sequence(Rgb::new(250, 250, 250), &filaments, &settings);
        assert_eq!(seq, vec![0]);
    }

    #[test]
    fn test_gray_needs_dithering() {
        // Opaque black over white can only reach black or white.
        let filaments = white_black_opaque();
        let solution = solve(Rgb::new(128, 128, 128), &filaments, &SearchSettings::default());
        match solution {
            ColorSolution::Dithered {
                base_sequence,
                dither,
                base_color,
            } => {
                assert!(base_sequence.is_empty());
                assert_eq!(base_color, Rgb::WHITE);
                assert_eq!(dither.filament, 1);
                assert_eq!(dither.ratio, 0.5);
                assert_eq!(dither.pattern, DitherPattern::Horizontal);
            }
            other => panic!("expected dithering, got {other:?}"),
        }
    }

    #[test]
    fn test_close_match_stays_sequential() {
        let solution = solve(Rgb::BLACK, &white_black_opaque(), &SearchSettings::default());
        assert_eq!(solution, ColorSolution::Sequential { sequence: vec![1] });
        assert!(solution.dither().is_none());
    }

    #[test]
    fn test_validate() {
        let filaments = white_black_opaque();
        assert!(SearchSettings::default().validate(&filaments).is_ok());
        assert_eq!(
            SearchSettings::default().validate(&[]),
            Err(ConfigError::NoFilaments)
        );
        let bad = SearchSettings {
            substrate: Some(2),
            ..Default::default()
        };
        assert_eq!(bad.validate(&filaments), Err(ConfigError::InvalidSubstrate(2)));
        let bad = SearchSettings {
            layer_height: -0.1,
            ..Default::default()
        };
        assert!(bad.validate(&filaments).is_err());
        let bad = SearchSettings {
            line_width: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(bad.validate(&filaments), Err(ConfigError::InvalidSetting(_))));
    }
}
