//! Health record custody and access-grant engine.
//!
//! Patients pin encrypted medical documents to a remote content-addressed
//! store and grant clinicians time-boxed, revocable access to specific
//! records. The engine reconciles a wallet identity with a server-issued
//! session into one authoritative role, wraps the pinning provider behind a
//! resilient adapter, and runs the access-request state machine that decides
//! who may retrieve which record, for how long.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌─────────────────┐      ┌──────────────────┐
//! │ IdentityResolver │─────▶│   GrantStore    │─────▶│   ObjectStore    │
//! │ (session+wallet) │      │ (state machine) │      │ (pin / unpin)    │
//! └──────────────────┘      └─────────────────┘      └──────────────────┘
//!          │                        │                         │
//!          ▼                        ▼                         ▼
//! ┌──────────────────┐      ┌─────────────────┐      ┌──────────────────┐
//! │     Backend      │      │   AuditLedger   │      │  PinningService  │
//! │ (redis / memory) │      │  (NATS, async)  │      │ (remote provider)│
//! └──────────────────┘      └─────────────────┘      └──────────────────┘
//! ```
//!
//! An actor resolves to an identity, the identity creates or answers access
//! requests, and an approved, unexpired request authorizes retrieval of the
//! referenced records through the object store adapter.

pub mod api;
pub mod config;
pub mod grants;
pub mod identity;
pub mod ledger;
pub mod persist;
pub mod records;
pub mod store;

pub use config::{load_config, ServerSettings};
pub use grants::{AccessRequest, Decision, GrantDuration, GrantError, GrantStore, RequestStatus};
pub use identity::{
    Identity, IdentityError, IdentityResolver, Role, SessionClaims, TeardownCoordinator, User,
    UserRegistry,
};
pub use persist::{Backend, MemoryBackend, PersistError, RedisBackend};
pub use records::{RecordEntry, RecordError, RecordService};
pub use store::{
    DeleteOutcome, DocumentCipher, DocumentHandle, ObjectStore, PinningService, StoreError,
    UploadMetadata, UploadReceipt,
};
