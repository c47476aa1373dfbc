//! Best-effort audit ledger.
//!
//! Grant and custody events are mirrored to an external append-only log
//! over NATS. Writes are fire-and-forget: a publish never blocks a core
//! operation and a failure only logs a warning. The connection re-dials in
//! the background when it drops.

use crate::grants::RequestStatus;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

const NATS_RETRY_INTERVAL: Duration = Duration::from_secs(5);

pub struct NatsConnection {
    client: Mutex<Option<async_nats::Client>>,
    url: String,
}

impl NatsConnection {
    pub fn new(url: String) -> Self {
        Self {
            client: Mutex::new(None),
            url,
        }
    }

    pub async fn connect(&self) -> Result<(), async_nats::ConnectError> {
        let mut client = self.client.lock().await;
        match async_nats::connect(&self.url).await {
            Ok(new_client) => {
                *client = Some(new_client);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_client(&self) -> Option<async_nats::Client> {
        self.client.lock().await.clone()
    }
}

/// Keep re-dialing the ledger until the process exits.
pub fn spawn_reconnect_loop(connection: Arc<NatsConnection>) {
    tokio::spawn(async move {
        loop {
            if connection.get_client().await.is_none() {
                info!("audit ledger not connected, attempting to connect...");
                match connection.connect().await {
                    Ok(_) => info!("connected to audit ledger"),
                    Err(e) => {
                        error!(
                            "failed to connect to audit ledger: {}. Retrying in {:?}...",
                            e, NATS_RETRY_INTERVAL
                        );
                        tokio::time::sleep(NATS_RETRY_INTERVAL).await;
                        continue;
                    }
                }
            }
            tokio::time::sleep(NATS_RETRY_INTERVAL).await;
        }
    });
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    RecordUploaded {
        record_id: Uuid,
        owner_wallet: String,
        content_address: String,
        at: i64,
    },
    RecordDeleted {
        record_id: Uuid,
        owner_wallet: String,
        at: i64,
    },
    RequestCreated {
        request_id: Uuid,
        doctor_wallet: String,
        patient_wallet: String,
        at: i64,
    },
    RequestResponded {
        request_id: Uuid,
        status: RequestStatus,
        at: i64,
    },
    RequestRevoked {
        request_id: Uuid,
        at: i64,
    },
}

pub struct AuditLedger {
    connection: Arc<NatsConnection>,
    subject: String,
}

impl AuditLedger {
    pub fn new(connection: Arc<NatsConnection>, subject: String) -> Self {
        Self { connection, subject }
    }

    /// Publish without waiting. Offline or failing ledgers drop the event.
    pub fn publish(&self, event: AuditEvent) {
        let connection = Arc::clone(&self.connection);
        let subject = self.subject.clone();
        tokio::spawn(async move {
            let Some(client) = connection.get_client().await else {
                warn!("audit ledger offline, dropping event {:?}", event);
                return;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("could not serialize audit event: {}", e);
                    return;
                }
            };
            if let Err(e) = client.publish(subject, payload.into()).await {
                warn!("audit publish failed: {}", e);
            }
        });
    }
}
