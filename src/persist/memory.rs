//! In-memory backend for tests and single-process development.

use crate::grants::AccessRequest;
use crate::identity::User;
use crate::persist::{Backend, PersistError};
use crate::records::RecordEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryBackend {
    users: RwLock<HashMap<String, User>>,
    records: RwLock<HashMap<Uuid, RecordEntry>>,
    requests: RwLock<HashMap<Uuid, AccessRequest>>,
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn insert_user(&self, user: &User) -> Result<(), PersistError> {
        let mut users = self.users.write().unwrap();
        if users.contains_key(&user.wallet_address) {
            return Err(PersistError::DuplicateWallet(user.wallet_address.clone()));
        }
        users.insert(user.wallet_address.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_wallet(&self, wallet: &str) -> Result<Option<User>, PersistError> {
        Ok(self.users.read().unwrap().get(wallet).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), PersistError> {
        self.users
            .write()
            .unwrap()
            .insert(user.wallet_address.clone(), user.clone());
        Ok(())
    }

    async fn insert_record(&self, record: &RecordEntry) -> Result<(), PersistError> {
        self.records
            .write()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn record(&self, id: Uuid) -> Result<Option<RecordEntry>, PersistError> {
        Ok(self.records.read().unwrap().get(&id).cloned())
    }

    async fn records_owned_by(&self, wallet: &str) -> Result<Vec<RecordEntry>, PersistError> {
        let mut owned: Vec<RecordEntry> = self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.owner_wallet == wallet)
            .cloned()
            .collect();
        owned.sort_by_key(|r| std::cmp::Reverse(r.uploaded_at));
        Ok(owned)
    }

    async fn remove_record(&self, id: Uuid) -> Result<(), PersistError> {
        self.records.write().unwrap().remove(&id);
        Ok(())
    }

    async fn insert_request(&self, request: &AccessRequest) -> Result<(), PersistError> {
        self.requests
            .write()
            .unwrap()
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn request(&self, id: Uuid) -> Result<Option<AccessRequest>, PersistError> {
        Ok(self.requests.read().unwrap().get(&id).cloned())
    }

    async fn update_request(&self, request: &AccessRequest) -> Result<(), PersistError> {
        self.requests
            .write()
            .unwrap()
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn requests_involving(&self, wallet: &str) -> Result<Vec<AccessRequest>, PersistError> {
        let mut involved: Vec<AccessRequest> = self
            .requests
            .read()
            .unwrap()
            .values()
            .filter(|r| r.doctor_wallet == wallet || r.patient_wallet == wallet)
            .cloned()
            .collect();
        involved.sort_by_key(|r| std::cmp::Reverse(r.sent_at));
        Ok(involved)
    }

    async fn request_by_idempotency_key(
        &self,
        doctor_wallet: &str,
        key: &str,
    ) -> Result<Option<AccessRequest>, PersistError> {
        Ok(self
            .requests
            .read()
            .unwrap()
            .values()
            .find(|r| {
                r.doctor_wallet == doctor_wallet && r.idempotency_key.as_deref() == Some(key)
            })
            .cloned())
    }
}
