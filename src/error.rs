//! Error types for the embedding sync CLI.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to embedding API calls.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to reach embedding API: {0}")]
    ConnectionError(String),

    #[error("embedding API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding request timed out")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // Rate limits and upstream outages are transient
            EmbeddingError::ApiError { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to record store: {0}")]
    ConnectionError(String),

    #[error("pgvector extension missing: {0}")]
    PgVectorExtensionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("update error: {0}")]
    UpdateError(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            StoreError::ConnectionError(_) => true,
            StoreError::QueryError(msg) | StoreError::UpdateError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("too many")
            }
            StoreError::PgVectorExtensionError(_)
            | StoreError::CollectionError(_)
            | StoreError::NotFound(_) => false,
        }
    }
}

/// Errors raised while running the sync job.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(
        "embedding dimension mismatch at position {position}: expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("embedding API returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Other(String),
}
