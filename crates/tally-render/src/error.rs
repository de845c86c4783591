//! Render error types.

/// Errors that can occur while writing a document out.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The xlsx writer rejected a sheet, cell or chart.
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("manifest serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The temporary file could not be moved into place.
    #[error("failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A chart anchor is not a valid A1 reference.
    #[error("invalid chart anchor '{0}'")]
    InvalidAnchor(String),
}

/// A specialized `Result` type for rendering.
pub type Result<T> = std::result::Result<T, RenderError>;
