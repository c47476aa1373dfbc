use medvault::grants::{Decision, GrantStore, RequestStatus};
use medvault::identity::{Role, User};
use medvault::persist::{Backend, RedisBackend};
use medvault::records::RecordEntry;
use std::env;
use std::sync::Arc;
use uuid::Uuid;

// Exercises the redis-backed store against a real server. Runs only when
// MEDVAULT_TEST_REDIS_URL is set (local dev or CI with a redis service).
#[tokio::test]
async fn test_redis_backend_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let Ok(url) = env::var("MEDVAULT_TEST_REDIS_URL") else {
        eprintln!("Skipping integration test: MEDVAULT_TEST_REDIS_URL not set");
        return Ok(());
    };

    let client = Arc::new(redis::Client::open(url.as_str())?);
    let backend = Arc::new(RedisBackend::new(client));

    // Unique wallets per run so reruns do not trip the uniqueness check.
    let run = Uuid::new_v4().simple().to_string();
    let patient = format!("0xpatient-{}", run);
    let doctor = format!("0xdoctor-{}", run);

    backend.insert_user(&User::new(&patient, Role::Patient)).await?;
    backend.insert_user(&User::new(&doctor, Role::Doctor)).await?;
    let found = backend.find_user_by_wallet(&patient).await?;
    assert_eq!(found.map(|u| u.role), Some(Role::Patient));

    let record = RecordEntry::new(&patient, "blood panel", "application/pdf", "addr-1", 64);
    let record_id = record.id;
    backend.insert_record(&record).await?;
    assert_eq!(backend.records_owned_by(&patient).await?.len(), 1);

    let store = GrantStore::new(Arc::clone(&backend) as Arc<dyn Backend>, None);
    let request = store
        .create(&doctor, &patient, &[record_id], "need for diagnosis", 7, None)
        .await?;
    let approved = store
        .respond(&patient, request.id, Decision::Approved)
        .await?;
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(store
        .authorize(request.id, record_id, approved.expires_at - 1)
        .await?);

    // Clean up what this run created.
    backend.remove_record(record_id).await?;
    assert!(backend.records_owned_by(&patient).await?.is_empty());
    Ok(())
}
