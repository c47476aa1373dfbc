//! Content-addressed object store adapter.
//!
//! Wraps the remote pinning provider behind a small contract: encrypt and
//! pin on upload, fetch and decrypt into a scoped handle, and unpin with a
//! two-phase id lookup that treats absence as success. The provider
//! credential never leaves the server boundary.

pub mod adapter;
pub mod cipher;
pub mod error;
pub mod handle;
pub mod pinning;
pub mod types;

pub use adapter::ObjectStore;
pub use cipher::{Aes256GcmCipher, CipherError, DocumentCipher};
pub use error::{PinningError, StoreError};
pub use handle::DocumentHandle;
pub use pinning::{HttpPinningService, PinningService};
pub use types::{DeleteOutcome, PinnedEntry, UploadMetadata, UploadReceipt};
