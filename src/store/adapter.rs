//! Object store adapter: upload/pin, fetch/decrypt, delete/unpin.

use crate::store::cipher::DocumentCipher;
use crate::store::error::{PinningError, StoreError};
use crate::store::handle::DocumentHandle;
use crate::store::pinning::PinningService;
use crate::store::types::{DeleteOutcome, UploadMetadata, UploadReceipt};
use log::{debug, info, warn};
use std::sync::Arc;

pub struct ObjectStore {
    pinning: Arc<dyn PinningService>,
    cipher: Arc<dyn DocumentCipher>,
    max_upload_bytes: usize,
    delete_scan_page: usize,
}

impl ObjectStore {
    pub fn new(
        pinning: Arc<dyn PinningService>,
        cipher: Arc<dyn DocumentCipher>,
        max_upload_bytes: usize,
        delete_scan_page: usize,
    ) -> Self {
        Self {
            pinning,
            cipher,
            max_upload_bytes,
            delete_scan_page,
        }
    }

    /// Encrypt and pin a document. Identical plaintext uploads resolve to
    /// the same content address and the provider reports the repeat via
    /// `is_duplicate` instead of storing a second copy.
    pub async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        metadata: &UploadMetadata,
    ) -> Result<UploadReceipt, StoreError> {
        if !self.pinning.is_configured() {
            return Err(StoreError::UploadRejected(
                "pinning credential not configured".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(StoreError::UploadRejected("empty payload".to_string()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(StoreError::UploadTooLarge {
                size: bytes.len(),
                max: self.max_upload_bytes,
            });
        }

        let pairs = metadata.flatten()?;
        let sealed = self
            .cipher
            .seal(bytes)
            .map_err(|e| StoreError::Cipher(e.to_string()))?;

        let receipt = self
            .pinning
            .upload(sealed, file_name, &pairs)
            .await
            .map_err(|e| match e {
                PinningError::Unauthorized => {
                    StoreError::UploadRejected("pinning credential rejected".to_string())
                }
                other => StoreError::UploadRejected(other.to_string()),
            })?;

        info!(
            "pinned {} as {} ({} bytes, duplicate={})",
            file_name, receipt.content_address, receipt.size, receipt.is_duplicate
        );
        Ok(receipt)
    }

    /// Fetch and decrypt a document into a scoped handle.
    pub async fn retrieve(&self, content_address: &str) -> Result<DocumentHandle, StoreError> {
        let sealed = self
            .pinning
            .fetch(content_address)
            .await
            .map_err(|e| StoreError::RetrieveFailed(e.to_string()))?;

        let plaintext = self
            .cipher
            .open(&sealed)
            .map_err(|e| StoreError::Cipher(e.to_string()))?;

        Ok(DocumentHandle::new(content_address.to_string(), plaintext))
    }

    /// Scoped retrieval: the handle is dropped (and its buffer wiped) on
    /// every exit path of `f`.
    pub async fn with_document<T>(
        &self,
        content_address: &str,
        f: impl FnOnce(&[u8]) -> T,
    ) -> Result<T, StoreError> {
        let handle = self.retrieve(content_address).await?;
        Ok(f(handle.bytes()))
    }

    /// Unpin by content address. The provider deletes by internal file id,
    /// so this resolves the id in two phases: a direct search, then a
    /// bounded scan of recent pins. An address absent from both is already
    /// deleted as far as the caller is concerned.
    pub async fn delete(&self, content_address: &str) -> Result<DeleteOutcome, StoreError> {
        let file_id = match self.pinning.search(content_address).await {
            Ok(Some(id)) => Some(id),
            Ok(None) => None,
            Err(e) => {
                // Search is best-effort; the scan below still gets a chance.
                warn!("pin search for {} failed: {}", content_address, e);
                None
            }
        };

        let file_id = match file_id {
            Some(id) => id,
            None => {
                let page = self
                    .pinning
                    .list(self.delete_scan_page)
                    .await
                    .map_err(|e| {
                        StoreError::DeleteFailed(format!("could not establish pin state: {}", e))
                    })?;
                match page
                    .into_iter()
                    .find(|entry| entry.content_address == content_address)
                {
                    Some(entry) => entry.file_id,
                    None => {
                        debug!("{} not pinned, delete already satisfied", content_address);
                        return Ok(DeleteOutcome::AlreadyAbsent);
                    }
                }
            }
        };

        match self.pinning.remove(&file_id).await {
            Ok(()) => {
                info!("unpinned {}", content_address);
                Ok(DeleteOutcome::Removed)
            }
            // Lost a race with another unpin: same end state, same answer.
            Err(PinningError::NotFound) => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(StoreError::DeleteFailed(e.to_string())),
        }
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("delete_scan_page", &self.delete_scan_page)
            .finish()
    }
}
