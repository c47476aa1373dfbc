//! Redis-backed persistence.
//!
//! Rows are stored as JSON values under typed keys; wallet-scoped lookups go
//! through Redis sets that index row ids per wallet.

use crate::grants::AccessRequest;
use crate::identity::User;
use crate::persist::{Backend, PersistError};
use crate::records::RecordEntry;
use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;
use uuid::Uuid;

pub struct RedisBackend {
    client: Arc<RedisClient>,
}

impl RedisBackend {
    pub fn new(client: Arc<RedisClient>) -> Self {
        Self { client }
    }

    // Key constructors
    fn user_key(wallet: &str) -> String {
        format!("user:{}", wallet)
    }

    fn record_key(id: Uuid) -> String {
        format!("record:{}", id)
    }

    fn owner_records_key(wallet: &str) -> String {
        format!("owner:{}:records", wallet)
    }

    fn request_key(id: Uuid) -> String {
        format!("request:{}", id)
    }

    fn wallet_requests_key(wallet: &str) -> String {
        format!("wallet:{}:requests", wallet)
    }

    fn idempotency_key(doctor_wallet: &str, key: &str) -> String {
        format!("request:idem:{}:{}", doctor_wallet, key)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, PersistError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistError> {
        let mut conn = self.connection().await?;
        let json: Option<String> = conn.get(key).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), PersistError> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(value)?;
        let _: () = conn.set(key, json).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn insert_user(&self, user: &User) -> Result<(), PersistError> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(user)?;

        // SET NX keeps wallet addresses unique without a read-check race.
        let created: bool = redis::cmd("SET")
            .arg(Self::user_key(&user.wallet_address))
            .arg(json)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        if !created {
            return Err(PersistError::DuplicateWallet(user.wallet_address.clone()));
        }
        Ok(())
    }

    async fn find_user_by_wallet(&self, wallet: &str) -> Result<Option<User>, PersistError> {
        self.get_json(&Self::user_key(wallet)).await
    }

    async fn update_user(&self, user: &User) -> Result<(), PersistError> {
        self.set_json(&Self::user_key(&user.wallet_address), user)
            .await
    }

    async fn insert_record(&self, record: &RecordEntry) -> Result<(), PersistError> {
        self.set_json(&Self::record_key(record.id), record).await?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .sadd(
                Self::owner_records_key(&record.owner_wallet),
                record.id.to_string(),
            )
            .await?;
        Ok(())
    }

    async fn record(&self, id: Uuid) -> Result<Option<RecordEntry>, PersistError> {
        self.get_json(&Self::record_key(id)).await
    }

    async fn records_owned_by(&self, wallet: &str) -> Result<Vec<RecordEntry>, PersistError> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn.smembers(Self::owner_records_key(wallet)).await?;

        let mut owned = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get_json::<RecordEntry>(&format!("record:{}", id)).await? {
                owned.push(record);
            }
        }
        owned.sort_by_key(|r| std::cmp::Reverse(r.uploaded_at));
        Ok(owned)
    }

    async fn remove_record(&self, id: Uuid) -> Result<(), PersistError> {
        if let Some(record) = self.record(id).await? {
            let mut conn = self.connection().await?;
            let _: () = conn
                .srem(
                    Self::owner_records_key(&record.owner_wallet),
                    id.to_string(),
                )
                .await?;
            let _: () = conn.del(Self::record_key(id)).await?;
        }
        Ok(())
    }

    async fn insert_request(&self, request: &AccessRequest) -> Result<(), PersistError> {
        self.set_json(&Self::request_key(request.id), request)
            .await?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .sadd(
                Self::wallet_requests_key(&request.doctor_wallet),
                request.id.to_string(),
            )
            .await?;
        let _: () = conn
            .sadd(
                Self::wallet_requests_key(&request.patient_wallet),
                request.id.to_string(),
            )
            .await?;
        if let Some(key) = request.idempotency_key.as_deref() {
            let _: () = conn
                .set(
                    Self::idempotency_key(&request.doctor_wallet, key),
                    request.id.to_string(),
                )
                .await?;
        }
        Ok(())
    }

    async fn request(&self, id: Uuid) -> Result<Option<AccessRequest>, PersistError> {
        self.get_json(&Self::request_key(id)).await
    }

    async fn update_request(&self, request: &AccessRequest) -> Result<(), PersistError> {
        self.set_json(&Self::request_key(request.id), request).await
    }

    async fn requests_involving(&self, wallet: &str) -> Result<Vec<AccessRequest>, PersistError> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn.smembers(Self::wallet_requests_key(wallet)).await?;

        let mut involved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(request) = self
                .get_json::<AccessRequest>(&format!("request:{}", id))
                .await?
            {
                involved.push(request);
            }
        }
        involved.sort_by_key(|r| std::cmp::Reverse(r.sent_at));
        Ok(involved)
    }

    async fn request_by_idempotency_key(
        &self,
        doctor_wallet: &str,
        key: &str,
    ) -> Result<Option<AccessRequest>, PersistError> {
        let mut conn = self.connection().await?;
        let id: Option<String> = conn
            .get(Self::idempotency_key(doctor_wallet, key))
            .await?;
        match id {
            Some(id) => self.get_json(&format!("request:{}", id)).await,
            None => Ok(None),
        }
    }
}
