//! Access-grant store: persists and transitions access requests.

use crate::grants::error::GrantError;
use crate::grants::types::{AccessRequest, Decision, GrantDuration, RequestStatus};
use crate::identity::normalize_wallet;
use crate::ledger::{AuditEvent, AuditLedger};
use crate::persist::Backend;
use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

/// Free-text purpose must carry at least this many characters.
pub const MIN_PURPOSE_LEN: usize = 10;

pub struct GrantStore {
    backend: Arc<dyn Backend>,
    ledger: Option<Arc<AuditLedger>>,
}

impl GrantStore {
    pub fn new(backend: Arc<dyn Backend>, ledger: Option<Arc<AuditLedger>>) -> Self {
        Self { backend, ledger }
    }

    /// Create a request from a clinician to a patient for a set of records.
    ///
    /// The patient must own every referenced record; titles are snapshotted
    /// here and never re-read. When an idempotency key is supplied and a
    /// request with the same `(doctor, key)` pair already exists, that
    /// request is returned instead of a duplicate being inserted.
    pub async fn create(
        &self,
        doctor_wallet: &str,
        patient_wallet: &str,
        record_ids: &[Uuid],
        purpose: &str,
        duration_days: u32,
        idempotency_key: Option<String>,
    ) -> Result<AccessRequest, GrantError> {
        let doctor_wallet = normalize_wallet(doctor_wallet);
        let patient_wallet = normalize_wallet(patient_wallet);
        if doctor_wallet.is_empty() || patient_wallet.is_empty() {
            return Err(GrantError::Validation(
                "doctor and patient wallet addresses must be set".to_string(),
            ));
        }

        let purpose = purpose.trim();
        if purpose.chars().count() < MIN_PURPOSE_LEN {
            return Err(GrantError::Validation(format!(
                "purpose must be at least {} characters",
                MIN_PURPOSE_LEN
            )));
        }

        let duration = GrantDuration::from_days(duration_days)
            .ok_or_else(|| GrantError::Validation(format!("invalid duration {} days", duration_days)))?;

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self
                .backend
                .request_by_idempotency_key(&doctor_wallet, key)
                .await?
            {
                info!("request create replay for key {}, returning {}", key, existing.id);
                return Ok(existing);
            }
        }

        // Dedupe while keeping creation order; the snapshot stays parallel.
        let mut unique_ids: Vec<Uuid> = Vec::with_capacity(record_ids.len());
        for id in record_ids {
            if !unique_ids.contains(id) {
                unique_ids.push(*id);
            }
        }
        if unique_ids.is_empty() {
            return Err(GrantError::Validation(
                "at least one record must be requested".to_string(),
            ));
        }

        let mut document_names = Vec::with_capacity(unique_ids.len());
        for id in &unique_ids {
            let record = self
                .backend
                .record(*id)
                .await?
                .ok_or_else(|| GrantError::Validation(format!("unknown record {}", id)))?;
            if record.owner_wallet != patient_wallet {
                return Err(GrantError::Validation(format!(
                    "record {} is not owned by the requested patient",
                    id
                )));
            }
            document_names.push(record.title);
        }

        let sent_at = Utc::now().timestamp();
        let request = AccessRequest {
            id: Uuid::new_v4(),
            doctor_wallet,
            patient_wallet,
            record_ids: unique_ids,
            document_names,
            purpose: purpose.to_string(),
            status: RequestStatus::Sent,
            sent_at,
            expires_at: sent_at + duration.as_secs(),
            responded_at: None,
            idempotency_key,
        };
        self.backend.insert_request(&request).await?;

        info!(
            "request {} sent from {} to {} for {} records, {} days",
            request.id,
            request.doctor_wallet,
            request.patient_wallet,
            request.record_ids.len(),
            duration.as_days()
        );
        self.publish(AuditEvent::RequestCreated {
            request_id: request.id,
            doctor_wallet: request.doctor_wallet.clone(),
            patient_wallet: request.patient_wallet.clone(),
            at: sent_at,
        });
        Ok(request)
    }

    /// Approve or deny a sent request. Only the referenced patient may do
    /// this; anyone else fails `Forbidden` with the status unchanged.
    pub async fn respond(
        &self,
        actor_wallet: &str,
        request_id: Uuid,
        decision: Decision,
    ) -> Result<AccessRequest, GrantError> {
        let mut request = self.load(request_id).await?;

        if normalize_wallet(actor_wallet) != request.patient_wallet {
            return Err(GrantError::Forbidden(
                "only the referenced patient may respond",
            ));
        }
        if request.status != RequestStatus::Sent {
            return Err(GrantError::InvalidTransition {
                current: request.status,
                action: "respond",
            });
        }

        request.status = match decision {
            Decision::Approved => RequestStatus::Approved,
            Decision::Denied => RequestStatus::Denied,
        };
        request.responded_at = Some(Utc::now().timestamp());
        self.backend.update_request(&request).await?;

        info!("request {} {}", request.id, request.status);
        self.publish(AuditEvent::RequestResponded {
            request_id: request.id,
            status: request.status,
            at: request.responded_at.unwrap_or_default(),
        });
        Ok(request)
    }

    /// Read-only authorization check used before every retrieval.
    pub async fn authorize(
        &self,
        request_id: Uuid,
        record_id: Uuid,
        now: i64,
    ) -> Result<bool, GrantError> {
        let request = self.load(request_id).await?;
        Ok(request.permits(record_id, now))
    }

    /// Withdraw an approved grant. Patient-only, and only while the grant
    /// is still effectively approved: a lazily expired grant is already
    /// terminal and cannot be revoked.
    pub async fn revoke(
        &self,
        actor_wallet: &str,
        request_id: Uuid,
    ) -> Result<AccessRequest, GrantError> {
        let mut request = self.load(request_id).await?;

        if normalize_wallet(actor_wallet) != request.patient_wallet {
            return Err(GrantError::Forbidden(
                "only the referenced patient may revoke",
            ));
        }
        let now = Utc::now().timestamp();
        let current = request.effective_status(now);
        if current != RequestStatus::Approved {
            return Err(GrantError::InvalidTransition {
                current,
                action: "revoke",
            });
        }

        request.status = RequestStatus::Revoked;
        self.backend.update_request(&request).await?;

        info!("request {} revoked by patient", request.id);
        self.publish(AuditEvent::RequestRevoked {
            request_id: request.id,
            at: now,
        });
        Ok(request)
    }

    pub async fn get(&self, request_id: Uuid) -> Result<AccessRequest, GrantError> {
        self.load(request_id).await
    }

    /// Requests where the wallet appears as doctor or patient, newest first.
    pub async fn involving(&self, wallet: &str) -> Result<Vec<AccessRequest>, GrantError> {
        Ok(self
            .backend
            .requests_involving(&normalize_wallet(wallet))
            .await?)
    }

    async fn load(&self, request_id: Uuid) -> Result<AccessRequest, GrantError> {
        self.backend
            .request(request_id)
            .await?
            .ok_or(GrantError::NotFound)
    }

    fn publish(&self, event: AuditEvent) {
        if let Some(ledger) = &self.ledger {
            ledger.publish(event);
        }
    }
}
