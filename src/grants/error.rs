//! Error types for the access-grant store.

use crate::grants::types::RequestStatus;
use crate::persist::PersistError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrantError {
    /// Bad input shape. Fails fast, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Authorization failure. Never retried, surfaced as access denied.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// State-machine misuse: the request is not in a state that allows the
    /// attempted transition.
    #[error("invalid transition: request is {current}, cannot {action}")]
    InvalidTransition {
        current: RequestStatus,
        action: &'static str,
    },

    #[error("access request not found")]
    NotFound,

    /// Persistence fault, eligible for user-triggered retry.
    #[error("storage error: {0}")]
    Storage(#[from] PersistError),
}
