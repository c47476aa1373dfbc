use log::{info, warn};
use medvault::api::{router, AppState};
use medvault::config::load_config;
use medvault::grants::GrantStore;
use medvault::identity::{IdentityResolver, TeardownCoordinator, UserRegistry};
use medvault::ledger::{spawn_reconnect_loop, AuditLedger, NatsConnection};
use medvault::persist::{Backend, RedisBackend};
use medvault::records::RecordService;
use medvault::store::{Aes256GcmCipher, DocumentCipher, HttpPinningService, ObjectStore};
use rand_core::{OsRng, RngCore};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let settings = load_config()?;

    // Document cipher: configured key, or an ephemeral one for dev runs.
    let cipher: Arc<dyn DocumentCipher> = match &settings.document_key_hex {
        Some(key_hex) => Arc::new(Aes256GcmCipher::from_hex(key_hex.expose_secret())?),
        None => {
            warn!("DOCUMENT_KEY_HEX not set; using an ephemeral key, documents will not be retrievable after restart");
            let mut key = [0u8; 32];
            OsRng.fill_bytes(&mut key);
            Arc::new(Aes256GcmCipher::new(key))
        }
    };

    if settings.pin_credential.is_none() {
        warn!("PIN_API_JWT not set; uploads will be rejected until a credential is configured");
    }
    let pinning = Arc::new(HttpPinningService::new(
        &settings.pin_api_url,
        &settings.pin_gateway_url,
        settings.pin_credential.clone(),
    ));
    let object_store = Arc::new(ObjectStore::new(
        pinning,
        cipher,
        settings.max_upload_bytes,
        settings.delete_scan_page,
    ));

    let redis_client = Arc::new(redis::Client::open(settings.redis_url.as_str())?);
    let backend: Arc<dyn Backend> = Arc::new(RedisBackend::new(redis_client));

    let nats_connection = Arc::new(NatsConnection::new(settings.nats_url.clone()));
    spawn_reconnect_loop(Arc::clone(&nats_connection));
    let ledger = Arc::new(AuditLedger::new(
        nats_connection,
        settings.nats_subject.clone(),
    ));

    let teardown = TeardownCoordinator::new(Duration::from_secs(settings.teardown_grace_secs));
    let resolver = Arc::new(IdentityResolver::new(
        Arc::clone(&backend),
        Arc::clone(&teardown),
    ));
    let registry = Arc::new(UserRegistry::new(Arc::clone(&backend)));
    let grants = Arc::new(GrantStore::new(
        Arc::clone(&backend),
        Some(Arc::clone(&ledger)),
    ));
    let records = Arc::new(RecordService::new(
        Arc::clone(&backend),
        object_store,
        Arc::clone(&grants),
        Some(ledger),
    ));

    let state = AppState {
        resolver,
        registry,
        records,
        grants,
        teardown,
        session_secret: Arc::new(settings.session_secret.expose_secret().as_bytes().to_vec()),
    };

    let listener = TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    info!("listening on 0.0.0.0:{}", settings.port);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
