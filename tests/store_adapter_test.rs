use async_trait::async_trait;
use medvault::grants::{Decision, GrantStore};
use medvault::identity::{Identity, Role, User};
use medvault::persist::{Backend, MemoryBackend};
use medvault::records::{RecordError, RecordService};
use medvault::store::{
    Aes256GcmCipher, DeleteOutcome, ObjectStore, PinnedEntry, PinningService, StoreError,
    UploadMetadata, UploadReceipt,
};
use medvault::store::PinningError;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Provider double with content addressing over the pinned bytes and
/// sequential internal file ids, the shape the real provider exposes.
#[derive(Default)]
struct FakePinning {
    entries: Mutex<HashMap<String, (String, Vec<u8>)>>,
    next_id: AtomicUsize,
    remove_calls: AtomicUsize,
}

#[async_trait]
impl PinningService for FakePinning {
    fn is_configured(&self) -> bool {
        true
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        _name: &str,
        _metadata: &[(String, String)],
    ) -> Result<UploadReceipt, PinningError> {
        let address = hex::encode(Sha256::digest(&bytes));
        let mut entries = self.entries.lock().unwrap();
        let is_duplicate = entries.contains_key(&address);
        if !is_duplicate {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            entries.insert(address.clone(), (format!("file-{}", id), bytes.clone()));
        }
        Ok(UploadReceipt {
            content_address: address,
            size: bytes.len() as u64,
            mime_type: "application/octet-stream".to_string(),
            is_duplicate,
        })
    }

    async fn search(&self, content_address: &str) -> Result<Option<String>, PinningError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(content_address)
            .map(|(id, _)| id.clone()))
    }

    async fn list(&self, page_size: usize) -> Result<Vec<PinnedEntry>, PinningError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .take(page_size)
            .map(|(address, (id, _))| PinnedEntry {
                file_id: id.clone(),
                content_address: address.clone(),
                name: String::new(),
            })
            .collect())
    }

    async fn remove(&self, file_id: &str) -> Result<(), PinningError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        let address = entries
            .iter()
            .find(|(_, (id, _))| id == file_id)
            .map(|(address, _)| address.clone());
        match address {
            Some(address) => {
                entries.remove(&address);
                Ok(())
            }
            None => Err(PinningError::NotFound),
        }
    }

    async fn fetch(&self, content_address: &str) -> Result<Vec<u8>, PinningError> {
        self.entries
            .lock()
            .unwrap()
            .get(content_address)
            .map(|(_, bytes)| bytes.clone())
            .ok_or(PinningError::NotFound)
    }
}

struct Fixture {
    backend: Arc<MemoryBackend>,
    pinning: Arc<FakePinning>,
    grants: Arc<GrantStore>,
    records: RecordService,
    patient: Identity,
    doctor: Identity,
}

async fn fixture() -> Fixture {
    let backend = Arc::new(MemoryBackend::default());
    let patient_user = User::new("0xpatient", Role::Patient);
    let doctor_user = User::new("0xdoctor", Role::Doctor);
    backend.insert_user(&patient_user).await.unwrap();
    backend.insert_user(&doctor_user).await.unwrap();

    let pinning = Arc::new(FakePinning::default());
    let store = Arc::new(ObjectStore::new(
        Arc::clone(&pinning) as Arc<dyn PinningService>,
        Arc::new(Aes256GcmCipher::new([3u8; 32])),
        100 * 1024 * 1024,
        100,
    ));
    let grants = Arc::new(GrantStore::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        None,
    ));
    let records = RecordService::new(
        Arc::clone(&backend) as Arc<dyn Backend>,
        store,
        Arc::clone(&grants),
        None,
    );

    Fixture {
        backend,
        pinning,
        grants,
        records,
        patient: Identity::authenticated(patient_user),
        doctor: Identity::authenticated(doctor_user),
    }
}

#[tokio::test]
async fn test_round_trip_of_large_payload() {
    let fx = fixture().await;
    let mut payload = vec![0u8; 10 * 1024 * 1024];
    rand::thread_rng().fill_bytes(&mut payload);

    let outcome = fx
        .records
        .upload(&fx.patient, "imaging series", "application/dicom", &payload)
        .await
        .unwrap();
    assert!(!outcome.receipt.is_duplicate);

    let fetched = fx
        .records
        .with_document(&fx.patient, outcome.record.id, None, |_, bytes| {
            bytes.to_vec()
        })
        .await
        .unwrap();
    assert_eq!(fetched, payload);
}

#[tokio::test]
async fn test_duplicate_upload_creates_second_record_identity() {
    let fx = fixture().await;
    let payload = b"identical bytes";

    let first = fx
        .records
        .upload(&fx.patient, "original", "text/plain", payload)
        .await
        .unwrap();
    let second = fx
        .records
        .upload(&fx.patient, "copy", "text/plain", payload)
        .await
        .unwrap();

    assert!(!first.receipt.is_duplicate);
    assert!(second.receipt.is_duplicate);
    assert_eq!(
        first.record.content_address,
        second.record.content_address
    );
    assert_ne!(first.record.id, second.record.id);

    // Both rows exist; re-upload never mutates an existing record.
    let owned = fx.records.list_own(&fx.patient).await.unwrap();
    assert_eq!(owned.len(), 2);
}

#[tokio::test]
async fn test_upload_requires_patient_role() {
    let fx = fixture().await;

    let err = fx
        .records
        .upload(&fx.doctor, "notes", "text/plain", b"payload")
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::Forbidden(_)));

    let err = fx
        .records
        .upload(&Identity::Unauthenticated, "notes", "text/plain", b"payload")
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::Forbidden(_)));
}

#[tokio::test]
async fn test_doctor_fetch_requires_active_grant() {
    let fx = fixture().await;
    let outcome = fx
        .records
        .upload(&fx.patient, "blood panel", "application/pdf", b"results")
        .await
        .unwrap();
    let record_id = outcome.record.id;

    // No request at all.
    let err = fx
        .records
        .fetch(&fx.doctor, record_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::Forbidden(_)));

    // Sent but unanswered.
    let request = fx
        .grants
        .create(
            "0xdoctor",
            "0xpatient",
            &[record_id],
            "need for diagnosis",
            7,
            None,
        )
        .await
        .unwrap();
    let err = fx
        .records
        .fetch(&fx.doctor, record_id, Some(request.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::Forbidden(_)));

    // Approved: readable.
    fx.grants
        .respond("0xpatient", request.id, Decision::Approved)
        .await
        .unwrap();
    let handle = fx
        .records
        .fetch(&fx.doctor, record_id, Some(request.id))
        .await
        .unwrap();
    assert_eq!(handle.bytes(), b"results");
    handle.release();

    // Revoked: dead again.
    fx.grants.revoke("0xpatient", request.id).await.unwrap();
    let err = fx
        .records
        .fetch(&fx.doctor, record_id, Some(request.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::Forbidden(_)));
}

#[tokio::test]
async fn test_grant_does_not_leak_to_other_doctors() {
    let fx = fixture().await;
    let other_doctor = User::new("0xother", Role::Doctor);
    fx.backend.insert_user(&other_doctor).await.unwrap();

    let outcome = fx
        .records
        .upload(&fx.patient, "blood panel", "application/pdf", b"results")
        .await
        .unwrap();
    let request = fx
        .grants
        .create(
            "0xdoctor",
            "0xpatient",
            &[outcome.record.id],
            "need for diagnosis",
            7,
            None,
        )
        .await
        .unwrap();
    fx.grants
        .respond("0xpatient", request.id, Decision::Approved)
        .await
        .unwrap();

    let err = fx
        .records
        .fetch(
            &Identity::authenticated(other_doctor),
            outcome.record.id,
            Some(request.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::Forbidden(_)));
}

#[tokio::test]
async fn test_delete_twice_reports_success_both_times() {
    let fx = fixture().await;
    let outcome = fx
        .records
        .upload(&fx.patient, "old scan", "application/pdf", b"stale")
        .await
        .unwrap();

    let first = fx
        .records
        .delete(&fx.patient, outcome.record.id)
        .await
        .unwrap();
    assert_eq!(first, DeleteOutcome::Removed);

    let second = fx
        .records
        .delete(&fx.patient, outcome.record.id)
        .await
        .unwrap();
    assert_eq!(second, DeleteOutcome::AlreadyAbsent);

    // The second call performed no further destructive work.
    assert_eq!(fx.pinning.remove_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delete_is_owner_only() {
    let fx = fixture().await;
    let outcome = fx
        .records
        .upload(&fx.patient, "old scan", "application/pdf", b"stale")
        .await
        .unwrap();

    let err = fx
        .records
        .delete(&fx.doctor, outcome.record.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RecordError::Forbidden(_)));
}

#[tokio::test]
async fn test_unconfigured_provider_rejects_upload() {
    struct Unconfigured;

    #[async_trait]
    impl PinningService for Unconfigured {
        fn is_configured(&self) -> bool {
            false
        }
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            _name: &str,
            _metadata: &[(String, String)],
        ) -> Result<UploadReceipt, PinningError> {
            Err(PinningError::Unauthorized)
        }
        async fn search(&self, _content_address: &str) -> Result<Option<String>, PinningError> {
            Err(PinningError::Unauthorized)
        }
        async fn list(&self, _page_size: usize) -> Result<Vec<PinnedEntry>, PinningError> {
            Err(PinningError::Unauthorized)
        }
        async fn remove(&self, _file_id: &str) -> Result<(), PinningError> {
            Err(PinningError::Unauthorized)
        }
        async fn fetch(&self, _content_address: &str) -> Result<Vec<u8>, PinningError> {
            Err(PinningError::Unauthorized)
        }
    }

    let store = ObjectStore::new(
        Arc::new(Unconfigured),
        Arc::new(Aes256GcmCipher::new([3u8; 32])),
        1024,
        10,
    );
    let err = store
        .upload(b"data", "a.pdf", &UploadMetadata::new("a.pdf", "0xab"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UploadRejected(_)));
}
