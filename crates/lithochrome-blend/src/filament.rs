//! Print material description.

use serde::{Deserialize, Serialize};

use crate::model::alpha_from_thickness;
use crate::rgb::Rgb;

fn default_max_layers() -> u32 {
    5
}

/// A translucent print material used in stacking order.
///
/// Index 0 of a filament list is the substrate: it is printed first, covers
/// every opaque pixel and contributes exactly one shade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filament {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Colour of a fully opaque block of this material.
    pub color: Rgb,
    /// Thickness in mm at which the material stops transmitting light.
    /// Zero or negative means opaque.
    #[serde(alias = "td")]
    pub transmission_distance: f64,
    /// Number of layers this material may stack (ignored for the substrate).
    #[serde(default = "default_max_layers")]
    pub max_layers: u32,
}

impl Filament {
    /// Create an unnamed filament.
    pub fn new(color: Rgb, transmission_distance: f64, max_layers: u32) -> Self {
        Self {
            name: None,
            color,
            transmission_distance,
            max_layers,
        }
    }

    /// Attach a display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Opacity of one layer at the given layer height.
    pub fn alpha(&self, layer_height: f64) -> f64 {
        alpha_from_thickness(layer_height, self.transmission_distance)
    }

    /// Name for log and CLI output, falling back to the colour.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.color.to_hex())
    }
}
