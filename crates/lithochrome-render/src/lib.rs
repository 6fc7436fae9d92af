#![warn(missing_docs)]

//! Previews of lithochrome layer stacks.
//!
//! [`render_preview`] paints a stack into an RGBA raster, [`render_svg`]
//! writes the same outlines as SVG paths, and [`pick_material`] maps a
//! preview pixel back to the shade that produced it.

pub mod pick;
pub mod raster;
pub mod svg;

pub use pick::pick_material;
pub use raster::{render_preview, RenderSettings};
pub use svg::render_svg;
