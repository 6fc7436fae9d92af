use thiserror::Error;

/// Errors returned by lithochrome pipelines.
#[derive(Error, Debug)]
pub enum Error {
    /// Filament list or settings are unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] lithochrome_blend::ConfigError),

    /// Mesh stacking parameters are unusable.
    #[error("invalid mesh settings: {0}")]
    Mesh(#[from] lithochrome_mesh::MeshError),

    /// Project file is not valid TOML for a project.
    #[error("project parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// An I/O error occurred while reading a project.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker pool could not be started.
    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for lithochrome operations.
pub type Result<T> = std::result::Result<T, Error>;
