//! Export error type.

/// Errors that can occur while serializing or rendering results.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON serialization or parsing failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),

    /// The overlay canvas could not be allocated.
    #[error("cannot render a {width}x{height} overlay")]
    EmptyCanvas {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}
