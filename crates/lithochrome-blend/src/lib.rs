#![warn(missing_docs)]

//! Colour side of lithochrome.
//!
//! Everything here works on colours and pixels, never on geometry:
//!
//! - [`model`]: opacity of a printed layer and colour compositing
//! - [`ladder`]: the shade ladder of an ordered filament stack
//! - [`classify`]: snapping source pixels to the nearest achievable shade
//! - [`search`], [`dither`], [`cache`], [`plan`]: the per-pixel greedy mode
//!   for unordered palettes, with optional line dithering
//!
//! # Example
//!
//! ```
//! use lithochrome_blend::{build_shades, Filament, Rgb, ShadeKey};
//!
//! let filaments = vec![
//!     Filament::new(Rgb::BLACK, 0.0, 1),
//!     Filament::new(Rgb::WHITE, 7.5, 5),
//! ];
//! let palette = build_shades(&filaments, 0.2).unwrap();
//! assert_eq!(palette.shade(ShadeKey::new(1, 1)), Some(Rgb::new(128, 128, 128)));
//! ```

pub mod cache;
pub mod classify;
pub mod dither;
mod error;
pub mod filament;
pub mod ladder;
pub mod model;
pub mod plan;
mod rgb;
pub mod search;

pub use cache::SequenceCache;
pub use classify::{classify, ClassifiedImage};
pub use dither::DitherPattern;
pub use error::{ConfigError, Result};
pub use filament::Filament;
pub use ladder::{build_shades, ShadeKey, ShadePalette};
pub use model::{alpha_from_thickness, composite, rgb_distance};
pub use plan::{plan_layers, simulate_print, DitherMark, LayerPlan};
pub use rgb::Rgb;
pub use search::{
    color_sequence, solve, ColorSolution, DitherChoice, PaletteFilament, SearchSettings,
};
