//! Error types for the model rasterizer.

use thiserror::Error;

/// Result type alias using RasterError.
pub type Result<T> = std::result::Result<T, RasterError>;

/// Main error type for pack loading and model rendering operations.
#[derive(Error, Debug)]
pub enum RasterError {
    /// Failed to read or parse a ZIP archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or process an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found in any loaded pack.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Invalid resource pack structure.
    #[error("Invalid resource pack: {0}")]
    InvalidPack(String),

    /// Failed to resolve a block model.
    #[error("Model resolution error: {0}")]
    ModelResolution(String),

    /// Element rotation angle outside the supported set.
    #[error("element rotation must be 0, 22.5 or 45 degrees with either sign, got {0}")]
    InvalidRotationAngle(f32),

    /// Invalid regex in a resource filter rule.
    #[error("Invalid resource filter pattern: {0}")]
    InvalidFilterPattern(#[from] regex::Error),

    /// Operation on a resource manager or renderer that was already closed.
    #[error("{0} already closed")]
    Closed(&'static str),

    /// The render worker pool rejected or lost a task.
    #[error("Render pool error: {0}")]
    RenderPool(String),
}
