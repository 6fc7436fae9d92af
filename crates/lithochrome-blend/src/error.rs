//! Error types for colour configuration.

use thiserror::Error;

/// Invalid input detected before any parallel work starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The filament list is empty.
    #[error("no filaments given")]
    NoFilaments,

    /// Layer height is zero, negative or not finite.
    #[error("layer height must be positive, got {0}")]
    InvalidLayerHeight(f64),

    /// A stacked filament allows fewer than one layer.
    #[error("filament {filament} has max_layers = {max_layers}, need at least 1")]
    InvalidLayerCount {
        /// Index of the offending filament.
        filament: usize,
        /// The configured layer count.
        max_layers: u32,
    },

    /// Requested substrate index does not name a filament.
    #[error("substrate index {0} is out of range")]
    InvalidSubstrate(usize),

    /// Colour string is not `#rrggbb`.
    #[error("invalid colour {0:?}, expected #rrggbb")]
    InvalidColor(String),

    /// Any other out-of-range setting.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Result type for colour configuration.
pub type Result<T> = std::result::Result<T, ConfigError>;
