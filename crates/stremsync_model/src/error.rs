//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building domain values.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A manifest could not be parsed or is missing required fields.
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// A manifest URL is empty or structurally unusable.
    #[error("invalid manifest url: {0}")]
    ManifestUrl(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Manifest(err.to_string())
    }
}
