use thiserror::Error;

/// Top-level error type for the Quarry retrieval service.
///
/// Recoverable conditions (`ProviderUnavailable`, `DimensionMismatch`) are
/// normally absorbed by the pipeline and only logged. `InvalidParameters` is
/// raised before any work starts, and `NotFound` surfaces from single-document
/// lookups.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuarryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("No valid embeddings generated")]
    NoValidEmbeddings,

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for QuarryError {
    fn from(err: toml::de::Error) -> Self {
        QuarryError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for QuarryError {
    fn from(err: toml::ser::Error) -> Self {
        QuarryError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for QuarryError {
    fn from(err: serde_json::Error) -> Self {
        QuarryError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;
