//! Error types for identity resolution and the user registry.

use crate::persist::PersistError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// A lookup against the persistence layer failed. Recoverable; the
    /// previously resolved identity stays in place (fail-closed).
    #[error("identity lookup failed: {0}")]
    LookupFailed(#[from] PersistError),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),
}
