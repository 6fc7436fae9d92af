//! Named quality presets in physical units.

use serde::{Deserialize, Serialize};

/// Outline smoothness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPreset {
    /// Coarse outlines traced at the pixel midpoint.
    #[default]
    Draft,
    /// Medium detail.
    Medium,
    /// Fine detail.
    Fine,
    /// Nearly unsimplified outlines.
    Ultra,
}

impl ResolutionPreset {
    /// Douglas-Peucker tolerance in millimetres.
    pub fn simplify_tolerance_mm(self) -> f64 {
        match self {
            Self::Draft => 0.1,
            Self::Medium => 0.05,
            Self::Fine => 0.001,
            Self::Ultra => 0.0001,
        }
    }

    /// Marching squares iso level.
    pub fn level(self) -> f64 {
        match self {
            Self::Draft => 0.5,
            Self::Medium => 0.25,
            Self::Fine => 0.05,
            Self::Ultra => 0.01,
        }
    }
}

/// Smallest island that survives tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailPreset {
    /// Drop specks under 0.03 mm².
    #[default]
    Coarse,
    /// Drop specks under 0.01 mm².
    Medium,
    /// Drop specks under 0.005 mm².
    Fine,
    /// Drop specks under 0.001 mm².
    Ultra,
}

impl DetailPreset {
    /// Minimum polygon area in square millimetres.
    pub fn min_area_mm2(self) -> f64 {
        match self {
            Self::Coarse => 0.03,
            Self::Medium => 0.01,
            Self::Fine => 0.005,
            Self::Ultra => 0.001,
        }
    }
}
