//! Remote pinning service contract and HTTP implementation.
//!
//! All provider calls carry a bearer credential held by the trusted server
//! boundary; callers of the adapter never see it. The provider's deletion
//! API is keyed by an internal file id, not the content address, which is
//! why the contract exposes both `search` and a bounded `list`.

use crate::store::error::PinningError;
use crate::store::types::{PinnedEntry, UploadReceipt};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashMap;

#[async_trait]
pub trait PinningService: Send + Sync {
    /// True when a credential is configured for mutating calls.
    fn is_configured(&self) -> bool;

    async fn upload(
        &self,
        bytes: Vec<u8>,
        name: &str,
        metadata: &[(String, String)],
    ) -> Result<UploadReceipt, PinningError>;

    /// Resolve a content address to the provider's internal file id.
    async fn search(&self, content_address: &str) -> Result<Option<String>, PinningError>;

    /// A bounded page of the most recent pins.
    async fn list(&self, page_size: usize) -> Result<Vec<PinnedEntry>, PinningError>;

    async fn remove(&self, file_id: &str) -> Result<(), PinningError>;

    /// Fetch pinned bytes by content address via the provider gateway.
    async fn fetch(&self, content_address: &str) -> Result<Vec<u8>, PinningError>;
}

// ==================== Provider wire types ====================

#[derive(Debug, Deserialize)]
struct PinResponse {
    cid: String,
    size: u64,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    #[serde(rename = "isDuplicate", default)]
    is_duplicate: bool,
    /// Provider-specific extension fields; carried but unused.
    #[serde(flatten)]
    _extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FileRow {
    id: String,
    cid: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    files: Vec<FileRow>,
}

/// Pinning provider spoken over HTTP.
pub struct HttpPinningService {
    http: reqwest::Client,
    api_base: String,
    gateway_base: String,
    credential: Option<Secret<String>>,
}

impl HttpPinningService {
    pub fn new(api_base: &str, gateway_base: &str, credential: Option<Secret<String>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            gateway_base: gateway_base.trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn bearer(&self) -> Result<&str, PinningError> {
        self.credential
            .as_ref()
            .map(|c| c.expose_secret().as_str())
            .ok_or(PinningError::Unauthorized)
    }

    fn classify_status(status: reqwest::StatusCode) -> Option<PinningError> {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            Some(PinningError::Unauthorized)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Some(PinningError::NotFound)
        } else if !status.is_success() {
            Some(PinningError::Protocol(format!(
                "provider returned {}",
                status
            )))
        } else {
            None
        }
    }
}

#[async_trait]
impl PinningService for HttpPinningService {
    fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        name: &str,
        metadata: &[(String, String)],
    ) -> Result<UploadReceipt, PinningError> {
        let bearer = self.bearer()?.to_string();
        let keyvalues: HashMap<&str, &str> = metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let metadata_json = serde_json::to_string(&keyvalues)
            .map_err(|e| PinningError::Protocol(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(name.to_string()),
            )
            .text("keyvalues", metadata_json);

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(bearer)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;

        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        let pin: PinResponse = response
            .json()
            .await
            .map_err(|e| PinningError::Protocol(e.to_string()))?;
        Ok(UploadReceipt {
            content_address: pin.cid,
            size: pin.size,
            mime_type: pin
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            is_duplicate: pin.is_duplicate,
        })
    }

    async fn search(&self, content_address: &str) -> Result<Option<String>, PinningError> {
        let bearer = self.bearer()?.to_string();
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(bearer)
            .query(&[("cid", content_address), ("limit", "1")])
            .send()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;

        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        let listing: FileListResponse = response
            .json()
            .await
            .map_err(|e| PinningError::Protocol(e.to_string()))?;
        Ok(listing
            .files
            .into_iter()
            .find(|row| row.cid == content_address)
            .map(|row| row.id))
    }

    async fn list(&self, page_size: usize) -> Result<Vec<PinnedEntry>, PinningError> {
        let bearer = self.bearer()?.to_string();
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(bearer)
            .query(&[("limit", page_size.to_string())])
            .send()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;

        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        let listing: FileListResponse = response
            .json()
            .await
            .map_err(|e| PinningError::Protocol(e.to_string()))?;
        Ok(listing
            .files
            .into_iter()
            .map(|row| PinnedEntry {
                file_id: row.id,
                content_address: row.cid,
                name: row.name,
            })
            .collect())
    }

    async fn remove(&self, file_id: &str) -> Result<(), PinningError> {
        let bearer = self.bearer()?.to_string();
        let response = self
            .http
            .delete(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;

        match Self::classify_status(response.status()) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    async fn fetch(&self, content_address: &str) -> Result<Vec<u8>, PinningError> {
        let response = self
            .http
            .get(format!("{}/{}", self.gateway_base, content_address))
            .send()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;

        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PinningError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl std::fmt::Debug for HttpPinningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPinningService")
            .field("api_base", &self.api_base)
            .field("gateway_base", &self.gateway_base)
            .field("configured", &self.is_configured())
            .finish()
    }
}
