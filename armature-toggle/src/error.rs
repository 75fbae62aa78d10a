// Error types for toggle definitions and configuration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToggleError {
    #[error("Invalid toggle id: {0:?}")]
    InvalidId(String),

    #[error("Invalid fraction for {id}: {fraction:?} (must be within [0.0, 1.0])")]
    InvalidFraction { id: String, fraction: f64 },

    #[error("Duplicate toggle id: {0}")]
    DuplicateId(String),

    #[error("Invalid override entry: {0:?}")]
    InvalidOverride(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToggleError>;
