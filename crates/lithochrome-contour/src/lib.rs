#![warn(missing_docs)]

//! Geometry side of the shade pipeline.
//!
//! Classified pixels become one occupancy grid per `(filament, layers)`
//! pair, each grid is traced into polygons, and the polygons are merged
//! downward so that every layer rests on the layers beneath it.

pub mod extract;
pub mod grid;
pub mod marching;
pub mod merge;
pub mod ops;
pub mod parallel;
pub mod rings;

pub use extract::{count_grids, extract_layers, trace_occupancy, ContourSettings, LayerStack};
pub use grid::{CountGrid, OccupancyGrid};
pub use merge::merge_downward;
pub use parallel::{no_progress, run_tasks, worker_pool, ProgressFn};
