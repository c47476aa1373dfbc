//! Error types for the object store adapter.

use thiserror::Error;

/// Faults from the remote pinning provider, classified before they reach
/// business logic.
#[derive(Debug, Error)]
pub enum PinningError {
    /// Credential missing or rejected by the provider.
    #[error("pinning credential missing or rejected")]
    Unauthorized,

    /// The referenced entry does not exist on the provider.
    #[error("pin entry not found")]
    NotFound,

    #[error("pinning transport failed: {0}")]
    Transport(String),

    #[error("unexpected pinning response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Payload over the configured limit. Not retryable.
    #[error("upload rejected: payload of {size} bytes exceeds the {max} byte limit")]
    UploadTooLarge { size: usize, max: usize },

    /// Upload refused or failed; eligible for user-triggered retry.
    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("retrieval failed: {0}")]
    RetrieveFailed(String),

    /// A genuine transport or auth failure while unpinning. Absence of the
    /// entry is never reported through this variant.
    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("invalid upload metadata: {0}")]
    InvalidMetadata(String),
}
