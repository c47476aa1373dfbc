//! Access-request state machine and store.

pub mod error;
pub mod store;
pub mod types;

pub use error::GrantError;
pub use store::{GrantStore, MIN_PURPOSE_LEN};
pub use types::{AccessRequest, Decision, GrantDuration, RequestStatus};
