//! Error types for FluoView.

use thiserror::Error;

/// Main error type for FluoView operations.
#[derive(Error, Debug)]
pub enum FluoViewError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported buffer layout: {0}")]
    UnsupportedBuffer(String),

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Resource probe error: {0}")]
    Probe(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for FluoView operations.
pub type Result<T> = std::result::Result<T, FluoViewError>;
