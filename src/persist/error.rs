//! Error types for the persistence layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("wallet address already registered: {0}")]
    DuplicateWallet(String),
}
