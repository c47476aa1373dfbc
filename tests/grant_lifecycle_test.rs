use medvault::grants::{Decision, GrantError, GrantStore, RequestStatus};
use medvault::identity::{Role, User};
use medvault::persist::{Backend, MemoryBackend};
use medvault::records::RecordEntry;
use std::sync::Arc;
use uuid::Uuid;

const PATIENT: &str = "0xpatient";
const DOCTOR: &str = "0xdoctor";

async fn seeded() -> (GrantStore, Vec<Uuid>) {
    let backend = Arc::new(MemoryBackend::default());
    backend
        .insert_user(&User::new(PATIENT, Role::Patient))
        .await
        .unwrap();
    backend
        .insert_user(&User::new(DOCTOR, Role::Doctor))
        .await
        .unwrap();

    let mut record_ids = Vec::new();
    for title in ["blood panel", "mri scan"] {
        let record = RecordEntry::new(PATIENT, title, "application/pdf", title, 128);
        record_ids.push(record.id);
        backend.insert_record(&record).await.unwrap();
    }
    (GrantStore::new(backend, None), record_ids)
}

// Full lifecycle from the patient's point of view: sent, approved by the
// right wallet only, then dead once the clock passes the deadline.
#[tokio::test]
async fn test_request_lifecycle_scenario() {
    let (store, record_ids) = seeded().await;

    // "need for diagnosis" is 18 chars, comfortably past the minimum.
    let request = store
        .create(DOCTOR, PATIENT, &record_ids, "need for diagnosis", 7, None)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Sent);
    assert_eq!(request.expires_at, request.sent_at + 7 * 24 * 60 * 60);
    assert_eq!(
        request.document_names,
        vec!["blood panel".to_string(), "mri scan".to_string()]
    );

    // The doctor cannot approve their own request.
    let err = store
        .respond(DOCTOR, request.id, Decision::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::Forbidden(_)));
    let unchanged = store.get(request.id).await.unwrap();
    assert_eq!(unchanged.status, RequestStatus::Sent);

    // The patient can.
    let approved = store
        .respond(PATIENT, request.id, Decision::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(approved.responded_at.is_some());

    // Inside the window the grant authorizes exactly the requested records.
    let inside = approved.expires_at - 60;
    assert!(store
        .authorize(request.id, record_ids[0], inside)
        .await
        .unwrap());
    assert!(store
        .authorize(request.id, record_ids[1], inside)
        .await
        .unwrap());
    assert!(!store
        .authorize(request.id, Uuid::new_v4(), inside)
        .await
        .unwrap());

    // One second past the deadline the grant is dead, with no write needed.
    assert!(!store
        .authorize(request.id, record_ids[0], approved.expires_at + 1)
        .await
        .unwrap());
    let stored = store.get(request.id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::Approved);
    assert_eq!(
        stored.effective_status(approved.expires_at + 1),
        RequestStatus::Expired
    );
}

#[tokio::test]
async fn test_denied_request_stays_terminal() {
    let (store, record_ids) = seeded().await;
    let request = store
        .create(DOCTOR, PATIENT, &record_ids, "follow-up consultation", 1, None)
        .await
        .unwrap();

    store
        .respond(PATIENT, request.id, Decision::Denied)
        .await
        .unwrap();

    let err = store
        .respond(PATIENT, request.id, Decision::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::InvalidTransition { .. }));

    let err = store.revoke(PATIENT, request.id).await.unwrap_err();
    assert!(matches!(err, GrantError::InvalidTransition { .. }));

    assert!(!store
        .authorize(request.id, record_ids[0], request.sent_at + 1)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_revoked_grant_stops_authorizing() {
    let (store, record_ids) = seeded().await;
    let request = store
        .create(DOCTOR, PATIENT, &record_ids, "second opinion review", 14, None)
        .await
        .unwrap();
    store
        .respond(PATIENT, request.id, Decision::Approved)
        .await
        .unwrap();

    let now = request.sent_at + 60;
    assert!(store.authorize(request.id, record_ids[0], now).await.unwrap());

    let revoked = store.revoke(PATIENT, request.id).await.unwrap();
    assert_eq!(revoked.status, RequestStatus::Revoked);
    assert!(!store.authorize(request.id, record_ids[0], now).await.unwrap());
}

#[tokio::test]
async fn test_snapshot_is_not_rederived_from_live_records() {
    let backend = Arc::new(MemoryBackend::default());
    let record = RecordEntry::new(PATIENT, "blood panel", "application/pdf", "addr-1", 128);
    let record_id = record.id;
    backend.insert_record(&record).await.unwrap();
    let store = GrantStore::new(Arc::clone(&backend) as Arc<dyn Backend>, None);

    let request = store
        .create(DOCTOR, PATIENT, &[record_id], "longitudinal study", 30, None)
        .await
        .unwrap();

    // Rename, then delete, the record underneath the request.
    let mut renamed = record.clone();
    renamed.title = "renamed".to_string();
    backend.insert_record(&renamed).await.unwrap();
    backend.remove_record(record_id).await.unwrap();

    let reloaded = store.get(request.id).await.unwrap();
    assert_eq!(reloaded.document_names, vec!["blood panel".to_string()]);
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let (store, record_ids) = seeded().await;
    let err = store
        .authorize(Uuid::new_v4(), record_ids[0], 0)
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::NotFound));
}
