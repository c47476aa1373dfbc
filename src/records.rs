//! Record registry: custody of a patient's documents.
//!
//! A record row is created only after the object store acknowledges the
//! upload. Rows are immutable once written: re-uploading identical bytes
//! creates a new record over the same content address instead of mutating
//! an existing one, which keeps the audit trail intact.

use crate::grants::{GrantError, GrantStore};
use crate::identity::{Identity, Role};
use crate::ledger::{AuditEvent, AuditLedger};
use crate::persist::{Backend, PersistError};
use crate::store::{DeleteOutcome, DocumentHandle, ObjectStore, StoreError, UploadMetadata, UploadReceipt};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub id: Uuid,
    /// Immutable; records belong to exactly one patient wallet.
    pub owner_wallet: String,
    pub title: String,
    pub file_type: String,
    /// Immutable once set.
    pub content_address: String,
    pub size_bytes: u64,
    pub uploaded_at: i64,
}

impl RecordEntry {
    pub fn new(
        owner_wallet: &str,
        title: &str,
        file_type: &str,
        content_address: &str,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_wallet: owner_wallet.to_string(),
            title: title.to_string(),
            file_type: file_type.to_string(),
            content_address: content_address.to_string(),
            size_bytes,
            uploaded_at: Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("record not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error("storage error: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub record: RecordEntry,
    pub receipt: UploadReceipt,
}

pub struct RecordService {
    backend: Arc<dyn Backend>,
    store: Arc<ObjectStore>,
    grants: Arc<GrantStore>,
    ledger: Option<Arc<AuditLedger>>,
}

impl RecordService {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<ObjectStore>,
        grants: Arc<GrantStore>,
        ledger: Option<Arc<AuditLedger>>,
    ) -> Self {
        Self {
            backend,
            store,
            grants,
            ledger,
        }
    }

    /// Upload a document for the acting patient. Always inserts a new row,
    /// even when the store reports the bytes as a duplicate.
    pub async fn upload(
        &self,
        actor: &Identity,
        title: &str,
        file_type: &str,
        bytes: &[u8],
    ) -> Result<UploadOutcome, RecordError> {
        let wallet = self.require_role(actor, Role::Patient, "only patients may upload records")?;
        let title = title.trim();
        if title.is_empty() {
            return Err(RecordError::Validation("title must be set".to_string()));
        }

        let record_id = Uuid::new_v4();
        let metadata = UploadMetadata::new(title, wallet)
            .with_record_id(record_id.to_string())
            .with_content_type(file_type);
        let receipt = self.store.upload(bytes, title, &metadata).await?;

        let record = RecordEntry {
            id: record_id,
            owner_wallet: wallet.to_string(),
            title: title.to_string(),
            file_type: file_type.to_string(),
            content_address: receipt.content_address.clone(),
            size_bytes: receipt.size,
            uploaded_at: Utc::now().timestamp(),
        };
        self.backend.insert_record(&record).await?;

        info!(
            "record {} created for {} at {}",
            record.id, record.owner_wallet, record.content_address
        );
        self.publish(AuditEvent::RecordUploaded {
            record_id: record.id,
            owner_wallet: record.owner_wallet.clone(),
            content_address: record.content_address.clone(),
            at: record.uploaded_at,
        });
        Ok(UploadOutcome { record, receipt })
    }

    /// Fetch and decrypt a record. Owners read their own records directly;
    /// anyone else must present an approved, unexpired access request that
    /// names them and covers this record.
    pub async fn fetch(
        &self,
        actor: &Identity,
        record_id: Uuid,
        via_request: Option<Uuid>,
    ) -> Result<DocumentHandle, RecordError> {
        let record = self.authorize_read(actor, record_id, via_request).await?;
        Ok(self.store.retrieve(&record.content_address).await?)
    }

    /// Scoped fetch: the decrypted buffer is wiped when `f` returns, on
    /// every exit path.
    pub async fn with_document<T>(
        &self,
        actor: &Identity,
        record_id: Uuid,
        via_request: Option<Uuid>,
        f: impl FnOnce(&RecordEntry, &[u8]) -> T,
    ) -> Result<T, RecordError> {
        let record = self.authorize_read(actor, record_id, via_request).await?;
        Ok(self
            .store
            .with_document(&record.content_address, |bytes| f(&record, bytes))
            .await?)
    }

    /// Unpin and drop a record. Owner-only. A row that is already gone is
    /// treated as deleted, not as an error.
    pub async fn delete(
        &self,
        actor: &Identity,
        record_id: Uuid,
    ) -> Result<DeleteOutcome, RecordError> {
        let wallet = actor
            .wallet()
            .ok_or(RecordError::Forbidden("authentication required"))?;

        let Some(record) = self.backend.record(record_id).await? else {
            return Ok(DeleteOutcome::AlreadyAbsent);
        };
        if record.owner_wallet != wallet {
            return Err(RecordError::Forbidden("only the owner may delete a record"));
        }

        let outcome = self.store.delete(&record.content_address).await?;
        self.backend.remove_record(record_id).await?;

        info!("record {} deleted by {}", record_id, wallet);
        self.publish(AuditEvent::RecordDeleted {
            record_id,
            owner_wallet: record.owner_wallet,
            at: Utc::now().timestamp(),
        });
        Ok(outcome)
    }

    /// Records owned by the acting wallet, newest first.
    pub async fn list_own(&self, actor: &Identity) -> Result<Vec<RecordEntry>, RecordError> {
        let wallet = actor
            .wallet()
            .ok_or(RecordError::Forbidden("authentication required"))?;
        Ok(self.backend.records_owned_by(wallet).await?)
    }

    pub async fn get(&self, record_id: Uuid) -> Result<RecordEntry, RecordError> {
        self.backend
            .record(record_id)
            .await?
            .ok_or(RecordError::NotFound)
    }

    async fn authorize_read(
        &self,
        actor: &Identity,
        record_id: Uuid,
        via_request: Option<Uuid>,
    ) -> Result<RecordEntry, RecordError> {
        let wallet = actor
            .wallet()
            .ok_or(RecordError::Forbidden("authentication required"))?;
        let record = self.get(record_id).await?;

        if record.owner_wallet == wallet {
            return Ok(record);
        }

        let request_id = via_request.ok_or(RecordError::Forbidden(
            "an approved access request is required",
        ))?;
        let request = self.grants.get(request_id).await?;
        if request.doctor_wallet != wallet {
            return Err(RecordError::Forbidden(
                "access request names a different clinician",
            ));
        }
        if !request.permits(record_id, Utc::now().timestamp()) {
            return Err(RecordError::Forbidden("no active grant for this record"));
        }
        Ok(record)
    }

    fn require_role<'a>(
        &self,
        actor: &'a Identity,
        role: Role,
        message: &'static str,
    ) -> Result<&'a str, RecordError> {
        match actor {
            Identity::Authenticated {
                role: actual,
                wallet_address,
                ..
            } if *actual == role => Ok(wallet_address),
            Identity::Authenticated { .. } => Err(RecordError::Forbidden(message)),
            Identity::Unauthenticated => Err(RecordError::Forbidden("authentication required")),
        }
    }

    fn publish(&self, event: AuditEvent) {
        if let Some(ledger) = &self.ledger {
            ledger.publish(event);
        }
    }
}
