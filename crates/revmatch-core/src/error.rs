use thiserror::Error;

/// Top-level error type for revmatch.
///
/// Absent persisted state and "reviewer not found" on delete are not errors:
/// they surface as empty results or `Ok(false)`. Only genuine failures land
/// here, and I/O failures stay distinct from corrupt persisted state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RevmatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),
}

impl From<toml::de::Error> for RevmatchError {
    fn from(err: toml::de::Error) -> Self {
        RevmatchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RevmatchError {
    fn from(err: toml::ser::Error) -> Self {
        RevmatchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RevmatchError {
    fn from(err: serde_json::Error) -> Self {
        RevmatchError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for RevmatchError {
    fn from(err: bincode::Error) -> Self {
        RevmatchError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for revmatch operations.
pub type Result<T> = std::result::Result<T, RevmatchError>;
