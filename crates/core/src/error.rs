//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid import status: {0}")]
    InvalidStatus(String),

    #[error("invalid import trigger: {0}")]
    InvalidTrigger(String),

    #[error("invalid sort key: {0}")]
    InvalidSort(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
