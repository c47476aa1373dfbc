//! Persistence collaborator contract.
//!
//! The engine only needs CRUD over three collections (users, records, and
//! access requests), keyed by opaque ids, queryable by wallet address, with
//! ordered retrieval by timestamp. `Backend` is that contract;
//! `RedisBackend` is the wired implementation and `MemoryBackend` backs
//! tests and single-process development.

pub mod error;
pub mod memory;
pub mod redis;

pub use self::error::PersistError;
pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

use crate::grants::AccessRequest;
use crate::identity::User;
use crate::records::RecordEntry;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Insert a user row. Fails with `DuplicateWallet` when the wallet
    /// address is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), PersistError>;
    async fn find_user_by_wallet(&self, wallet: &str) -> Result<Option<User>, PersistError>;
    async fn update_user(&self, user: &User) -> Result<(), PersistError>;

    async fn insert_record(&self, record: &RecordEntry) -> Result<(), PersistError>;
    async fn record(&self, id: Uuid) -> Result<Option<RecordEntry>, PersistError>;
    /// Records owned by a wallet, newest upload first.
    async fn records_owned_by(&self, wallet: &str) -> Result<Vec<RecordEntry>, PersistError>;
    async fn remove_record(&self, id: Uuid) -> Result<(), PersistError>;

    async fn insert_request(&self, request: &AccessRequest) -> Result<(), PersistError>;
    async fn request(&self, id: Uuid) -> Result<Option<AccessRequest>, PersistError>;
    async fn update_request(&self, request: &AccessRequest) -> Result<(), PersistError>;
    /// Requests where the wallet is the doctor or the patient, newest first.
    async fn requests_involving(&self, wallet: &str) -> Result<Vec<AccessRequest>, PersistError>;
    async fn request_by_idempotency_key(
        &self,
        doctor_wallet: &str,
        key: &str,
    ) -> Result<Option<AccessRequest>, PersistError>;
}
