//! Types crossing the object store adapter boundary.

use crate::store::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys the adapter itself writes; extension fields may not shadow them.
const RESERVED_KEYS: [&str; 4] = ["name", "owner_wallet", "record_id", "content_type"];

/// Longest accepted extension value; providers cap metadata size.
const MAX_EXTRA_VALUE_LEN: usize = 256;

/// Typed upload metadata: a fixed key set plus a validated escape hatch for
/// provider-specific extension fields. Flattened to key-value pairs at the
/// adapter boundary only.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub name: String,
    pub owner_wallet: String,
    pub record_id: Option<String>,
    pub content_type: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl UploadMetadata {
    pub fn new(name: &str, owner_wallet: &str) -> Self {
        Self {
            name: name.to_string(),
            owner_wallet: owner_wallet.to_string(),
            ..Default::default()
        }
    }

    pub fn with_record_id(mut self, record_id: String) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn with_extra(mut self, key: &str, value: &str) -> Self {
        self.extra.insert(key.to_string(), value.to_string());
        self
    }

    /// Validate and flatten into the wire form the provider expects.
    pub fn flatten(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut pairs = vec![
            ("name".to_string(), self.name.clone()),
            ("owner_wallet".to_string(), self.owner_wallet.clone()),
        ];
        if let Some(record_id) = &self.record_id {
            pairs.push(("record_id".to_string(), record_id.clone()));
        }
        if let Some(content_type) = &self.content_type {
            pairs.push(("content_type".to_string(), content_type.clone()));
        }
        for (key, value) in &self.extra {
            if key.is_empty() {
                return Err(StoreError::InvalidMetadata(
                    "extension key must not be empty".to_string(),
                ));
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(StoreError::InvalidMetadata(format!(
                    "extension key {} shadows a reserved field",
                    key
                )));
            }
            if value.len() > MAX_EXTRA_VALUE_LEN {
                return Err(StoreError::InvalidMetadata(format!(
                    "extension value for {} exceeds {} bytes",
                    key, MAX_EXTRA_VALUE_LEN
                )));
            }
            pairs.push((key.clone(), value.clone()));
        }
        Ok(pairs)
    }
}

/// What the pinning provider reports back for an upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadReceipt {
    /// Opaque retrieval key derived from the uploaded bytes.
    pub content_address: String,
    pub size: u64,
    pub mime_type: String,
    /// True when the provider already held identical bytes.
    pub is_duplicate: bool,
}

/// One row of the provider's pin listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedEntry {
    /// Provider-internal identifier; required by its deletion API.
    pub file_id: String,
    pub content_address: String,
    pub name: String,
}

/// How a delete concluded. Both variants are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Removed,
    /// Nothing matched the content address: a record absent from the store
    /// is equivalent to a successfully deleted one.
    AlreadyAbsent,
}
