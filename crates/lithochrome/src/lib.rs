#![warn(missing_docs)]

//! lithochrome: images to stacked translucent filament prints.
//!
//! Thin translucent layers of filament blend with what is printed under
//! them. Given an ordered filament stack, every pixel of an image is snapped
//! to the nearest colour the stack can reach, the pixels of each shade are
//! traced into outlines, and the outlines are extruded and stacked into
//! printable meshes.
//!
//! Two modes are available:
//!
//! - [`Pipeline`]: an ordered filament stack with a shade ladder per
//!   filament, traced and merged into solid layers
//! - [`ams`]: an unordered palette searched per pixel, with optional line
//!   dithering, for printers that switch filaments every layer
//!
//! # Example
//!
//! ```rust,no_run
//! use lithochrome::{Pipeline, Project};
//! use lithochrome::contour::no_progress;
//!
//! let project = Project::load("project.toml").unwrap();
//! let image = image::open("photo.png").unwrap().to_rgba8();
//! let pipeline = Pipeline::new(project).unwrap();
//! let preview = pipeline.preview(&image, &no_progress);
//! preview.image.save("preview.png").unwrap();
//! ```

pub mod ams;
pub mod config;
mod error;
pub mod pipeline;
pub mod presets;

pub use config::{AmsProject, PrintSettings, Project};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, Preview};
pub use presets::{DetailPreset, ResolutionPreset};

pub use lithochrome_blend as blend;
pub use lithochrome_contour as contour;
pub use lithochrome_mesh as mesh;
pub use lithochrome_render as render;
