use thiserror::Error;

/// Errors from mesh stacking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// Layer height is not a positive finite number.
    #[error("layer height must be positive, got {0}")]
    InvalidLayerHeight(f64),

    /// Physical size is not a positive finite number.
    #[error("maximum size must be positive, got {0} mm")]
    InvalidSize(f64),

    /// The source image has no pixels.
    #[error("image has zero width or height")]
    EmptyImage,
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
