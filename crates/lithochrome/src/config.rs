//! Project files.
//!
//! A project is a TOML document with an ordered `[[filaments]]` list and an
//! optional `[settings]` table:
//!
//! ```toml
//! [settings]
//! layer_height = 0.2
//! max_size_cm = 8.0
//! resolution = "medium"
//!
//! [[filaments]]
//! name = "black"
//! color = "#000000"
//! td = 0.6
//!
//! [[filaments]]
//! name = "white"
//! color = "#ffffff"
//! td = 7.5
//! max_layers = 5
//! ```

use std::path::Path;

use lithochrome_blend::ladder::validate_filaments;
use lithochrome_blend::{ConfigError, Filament, PaletteFilament, SearchSettings};
use lithochrome_contour::ContourSettings;
use lithochrome_mesh::{Granularity, StackSettings};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::presets::{DetailPreset, ResolutionPreset};

/// Physical print parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintSettings {
    /// Layer height in mm.
    pub layer_height: f64,
    /// Substrate layers under the image.
    pub base_layers: u32,
    /// Longer side of the print in cm.
    pub max_size_cm: f64,
    /// Outline smoothness.
    pub resolution: ResolutionPreset,
    /// Smallest island kept.
    pub detail: DetailPreset,
    /// Worker threads; one per core when unset.
    pub threads: Option<usize>,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            base_layers: 3,
            max_size_cm: 10.0,
            resolution: ResolutionPreset::Draft,
            detail: DetailPreset::Coarse,
            threads: None,
        }
    }
}

impl PrintSettings {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.layer_height.is_finite() || self.layer_height <= 0.0 {
            return Err(ConfigError::InvalidLayerHeight(self.layer_height).into());
        }
        if !self.max_size_cm.is_finite() || self.max_size_cm <= 0.0 {
            return Err(ConfigError::InvalidSetting(format!(
                "max_size_cm must be positive, got {}",
                self.max_size_cm
            ))
            .into());
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidSetting("threads must be at least 1".into()).into());
        }
        Ok(())
    }

    /// Longer side of the print in mm.
    pub fn max_size_mm(&self) -> f64 {
        self.max_size_cm * 10.0
    }

    /// Source pixels per millimetre of print.
    pub fn px_per_mm(&self, width: u32, height: u32) -> f64 {
        f64::from(width.max(height)) / self.max_size_mm()
    }

    /// Contour parameters in pixel units for a `width × height` image.
    ///
    /// Presets are physical, so the same preset simplifies a large image
    /// and a small one to the same outline in millimetres.
    pub fn contour_settings(&self, width: u32, height: u32) -> ContourSettings {
        let px_per_mm = self.px_per_mm(width, height);
        ContourSettings {
            min_area: self.detail.min_area_mm2() * px_per_mm * px_per_mm,
            simplify_tolerance: self.resolution.simplify_tolerance_mm() * px_per_mm,
            level: self.resolution.level(),
        }
    }

    /// Stacking parameters with the given grouping.
    pub fn stack_settings(&self, granularity: Granularity) -> StackSettings {
        StackSettings {
            layer_height: self.layer_height,
            base_layers: self.base_layers,
            max_size_mm: self.max_size_mm(),
            granularity,
        }
    }
}

/// An ordered filament stack and its print settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Filaments in print order; the first is the substrate.
    pub filaments: Vec<Filament>,
    /// Print settings.
    #[serde(default)]
    pub settings: PrintSettings,
}

impl Project {
    /// Project with default settings.
    pub fn new(filaments: Vec<Filament>) -> Self {
        Self {
            filaments,
            settings: PrintSettings::default(),
        }
    }

    /// Parse and validate a TOML project.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let project: Project = toml::from_str(s)?;
        project.validate()?;
        Ok(project)
    }

    /// Read a TOML project from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let project = Self::from_toml_str(&text)?;
        log::debug!(
            "loaded {} filaments from {}",
            project.filaments.len(),
            path.display()
        );
        Ok(project)
    }

    /// Check settings and filaments together.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        validate_filaments(&self.filaments, self.settings.layer_height)?;
        Ok(())
    }
}

/// An unordered palette for the per-pixel search mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmsProject {
    /// Available filaments.
    pub filaments: Vec<PaletteFilament>,
    /// Search and placement settings.
    #[serde(default)]
    pub search: SearchSettings,
    /// Worker threads; one per core when unset.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Outline smoothness of the traced layers.
    #[serde(default)]
    pub resolution: ResolutionPreset,
    /// Smallest island kept in the traced layers.
    #[serde(default)]
    pub detail: DetailPreset,
}

impl AmsProject {
    /// Parse and validate a TOML palette project.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let project: AmsProject = toml::from_str(s)?;
        project.search.validate(&project.filaments)?;
        Ok(project)
    }

    /// Read a TOML palette project from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Contour parameters in pixel units for a `width × height` image,
    /// sized against `search.max_size_mm` (100 mm when unset).
    pub fn contour_settings(&self, width: u32, height: u32) -> ContourSettings {
        let size = self.search.max_size_mm.unwrap_or(crate::ams::DEFAULT_SIZE_MM);
        let px_per_mm = f64::from(width.max(height)) / size;
        ContourSettings {
            min_area: self.detail.min_area_mm2() * px_per_mm * px_per_mm,
            simplify_tolerance: self.resolution.simplify_tolerance_mm() * px_per_mm,
            level: self.resolution.level(),
        }
    }
}
