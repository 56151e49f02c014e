//! Error types for the alert engine

use thiserror::Error;

/// Failure reported by a monitor, alert or incident repository.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Repository error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AlertEngineError {
    #[error("Durable store error: {0}")]
    Store(#[from] durable_store::StoreError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AlertEngineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AlertEngineError::Store(e) => e.is_retryable(),
            AlertEngineError::Repository(RepositoryError::Unavailable(_)) => true,
            _ => false,
        }
    }
}
