//! Error types for geometry construction and spatial queries

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    /// Degenerate or malformed primitive parameters.
    #[error("Construction error: {0}")]
    Construction(String),

    /// Batch or grid query input does not have the required layout.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T> = std::result::Result<T, GeomError>;
