//! Error types for integration setup and stepping.

use thiserror::Error;

/// Errors raised by the integrator, its methods and configuration.
#[derive(Debug, Error)]
pub enum MdError {
    #[error("method `{method}` shares particles with already registered method `{existing}`")]
    OverlappingGroups { method: String, existing: String },

    #[error("manifold does not fit inside the simulation box")]
    ManifoldOutsideBox,

    #[error("no GPU available: {0}")]
    GpuUnavailable(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("prepare_run() must be called before update()")]
    NotPrepared,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown particle tag {0}")]
    UnknownTag(u32),

    #[error("invalid anisotropic mode `{0}`, expected \"true\", \"false\" or \"auto\"")]
    InvalidAnisotropicMode(String),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MdError>;
