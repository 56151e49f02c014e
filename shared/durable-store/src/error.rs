//! Error types for durable store operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            StoreError::Pool(_) | StoreError::Unavailable(_) => true,
            StoreError::Serialization(_) | StoreError::Configuration(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
