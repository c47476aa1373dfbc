//! HTTP boundary for the custody engine.
//!
//! Thin axum handlers over the core services. Every handler resolves the
//! actor from the session bearer token and the connected-wallet header, then
//! delegates; no business rule lives here. Infrastructure faults map to a
//! generic retry response so neither the pinning credential nor provider
//! internals ever reach a client.

use crate::grants::{Decision, GrantError, GrantStore};
use crate::identity::{
    decode_session_token, Identity, IdentityError, IdentityResolver, Role, TeardownCoordinator,
    UserRegistry,
};
use crate::records::{RecordError, RecordService};
use crate::store::StoreError;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Header carrying the client-side connected wallet, the fallback identity
/// signal for users that predate session auth.
pub const WALLET_HEADER: &str = "x-wallet-address";

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<IdentityResolver>,
    pub registry: Arc<UserRegistry>,
    pub records: Arc<RecordService>,
    pub grants: Arc<GrantStore>,
    pub teardown: Arc<TeardownCoordinator>,
    pub session_secret: Arc<Vec<u8>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/whoami", get(whoami))
        .route("/auth/logout", post(logout))
        .route("/users", post(register_user))
        .route("/users/{wallet}/verify", post(verify_user))
        .route("/records", post(upload_record).get(list_records))
        .route(
            "/records/{id}",
            get(fetch_record).delete(delete_record),
        )
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/{id}/respond", post(respond_request))
        .route("/requests/{id}/revoke", post(revoke_request))
        .route("/requests/{id}/authorize", get(authorize_request))
        .with_state(state)
}

// ==================== Request/Response Types ====================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

#[derive(Debug, Deserialize)]
struct RegisterUserRequest {
    wallet_address: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct VerifyUserRequest {
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct UploadRecordRequest {
    title: String,
    file_type: String,
    /// Base64-encoded document bytes.
    data: String,
}

#[derive(Debug, Serialize)]
struct UploadRecordResponse {
    record_id: Uuid,
    content_address: String,
    size: u64,
    is_duplicate: bool,
}

#[derive(Debug, Deserialize)]
struct FetchQuery {
    request_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CreateRequestBody {
    patient_wallet: String,
    record_ids: Vec<Uuid>,
    purpose: String,
    duration_days: u32,
    idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RespondBody {
    decision: Decision,
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    record_id: Uuid,
}

// ==================== Error Mapping ====================

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, message: &str, retryable: bool) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.to_string(),
                retryable,
            },
        }
    }

    /// Infrastructure fault: log the detail server-side, hand the client a
    /// generic retry prompt.
    fn infrastructure(detail: impl std::fmt::Display) -> Self {
        error!("infrastructure fault: {}", detail);
        Self::new(
            StatusCode::BAD_GATEWAY,
            "temporary service failure, please retry",
            true,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<GrantError> for ApiError {
    fn from(e: GrantError) -> Self {
        match e {
            GrantError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, &message, false)
            }
            GrantError::Forbidden(_) => {
                ApiError::new(StatusCode::FORBIDDEN, "access denied", false)
            }
            GrantError::InvalidTransition { .. } => {
                warn!("state machine misuse: {}", e);
                ApiError::new(StatusCode::CONFLICT, &e.to_string(), false)
            }
            GrantError::NotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "access request not found", false)
            }
            GrantError::Storage(detail) => ApiError::infrastructure(detail),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UploadTooLarge { .. } => {
                ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, &e.to_string(), false)
            }
            StoreError::InvalidMetadata(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, &message, false)
            }
            StoreError::UploadRejected(detail)
            | StoreError::RetrieveFailed(detail)
            | StoreError::DeleteFailed(detail)
            | StoreError::Cipher(detail) => ApiError::infrastructure(detail),
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Forbidden(_) => {
                ApiError::new(StatusCode::FORBIDDEN, "access denied", false)
            }
            RecordError::NotFound => ApiError::new(StatusCode::NOT_FOUND, "record not found", false),
            RecordError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, &message, false)
            }
            RecordError::Store(inner) => inner.into(),
            RecordError::Grant(inner) => inner.into(),
            RecordError::Persist(detail) => ApiError::infrastructure(detail),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Forbidden(_) => {
                ApiError::new(StatusCode::FORBIDDEN, "access denied", false)
            }
            IdentityError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, &message, false)
            }
            IdentityError::LookupFailed(detail) => ApiError::infrastructure(detail),
        }
    }
}

// ==================== Actor Resolution ====================

async fn resolve_actor(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let session = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| decode_session_token(token, &state.session_secret));

    let connected_wallet = headers
        .get(WALLET_HEADER)
        .and_then(|value| value.to_str().ok());

    Ok(state
        .resolver
        .resolve(session.as_ref(), connected_wallet)
        .await?)
}

// ==================== Handlers ====================

async fn health() -> &'static str {
    "ok"
}

async fn whoami(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = resolve_actor(&state, &headers).await?;
    Ok(Json(json!({
        "authenticated": identity.is_authenticated(),
        "role": identity.role(),
        "wallet_address": identity.wallet(),
    })))
}

async fn logout(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let Some(ticket) = state.teardown.begin() else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "sign-out already in progress",
            false,
        ));
    };
    state.resolver.clear();
    ticket.complete();
    Ok(StatusCode::NO_CONTENT)
}

async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user = state.registry.register(&body.wallet_address, body.role).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": user.id,
            "wallet_address": user.wallet_address,
            "role": user.role,
            "verified": user.verified,
        })),
    ))
}

async fn verify_user(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
    headers: HeaderMap,
    Json(body): Json<VerifyUserRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let user = state
        .registry
        .set_verified(&actor, &wallet, body.verified)
        .await?;
    Ok(Json(json!({
        "wallet_address": user.wallet_address,
        "verified": user.verified,
    })))
}

async fn upload_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UploadRecordRequest>,
) -> Result<(StatusCode, Json<UploadRecordResponse>), ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let bytes = BASE64
        .decode(&body.data)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "data is not valid base64", false))?;

    let outcome = state
        .records
        .upload(&actor, &body.title, &body.file_type, &bytes)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadRecordResponse {
            record_id: outcome.record.id,
            content_address: outcome.receipt.content_address,
            size: outcome.receipt.size,
            is_duplicate: outcome.receipt.is_duplicate,
        }),
    ))
}

async fn list_records(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let records = state.records.list_own(&actor).await?;
    Ok(Json(json!({ "records": records })))
}

async fn fetch_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<FetchQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let payload = state
        .records
        .with_document(&actor, id, query.request_id, |record, bytes| {
            json!({
                "record_id": record.id,
                "title": record.title,
                "file_type": record.file_type,
                "data": BASE64.encode(bytes),
            })
        })
        .await?;
    Ok(Json(payload))
}

async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let outcome = state.records.delete(&actor, id).await?;
    Ok(Json(json!({ "outcome": outcome })))
}

async fn create_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let Identity::Authenticated {
        role: Role::Doctor,
        wallet_address,
        ..
    } = &actor
    else {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "access denied",
            false,
        ));
    };

    let request = state
        .grants
        .create(
            wallet_address,
            &body.patient_wallet,
            &body.record_ids,
            &body.purpose,
            body.duration_days,
            body.idempotency_key,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::to_value(&request).unwrap_or_default())))
}

async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let wallet = actor
        .wallet()
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "access denied", false))?;
    let now = Utc::now().timestamp();
    let requests: Vec<serde_json::Value> = state
        .grants
        .involving(wallet)
        .await?
        .into_iter()
        .map(|request| {
            let effective = request.effective_status(now);
            let mut value = serde_json::to_value(&request).unwrap_or_default();
            value["effective_status"] = json!(effective);
            value
        })
        .collect();
    Ok(Json(json!({ "requests": requests })))
}

async fn respond_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<RespondBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let wallet = actor
        .wallet()
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "access denied", false))?;
    let request = state.grants.respond(wallet, id, body.decision).await?;
    Ok(Json(serde_json::to_value(&request).unwrap_or_default()))
}

async fn revoke_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = resolve_actor(&state, &headers).await?;
    let wallet = actor
        .wallet()
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "access denied", false))?;
    let request = state.grants.revoke(wallet, id).await?;
    Ok(Json(serde_json::to_value(&request).unwrap_or_default()))
}

async fn authorize_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = Utc::now().timestamp();
    let authorized = state.grants.authorize(id, query.record_id, now).await?;
    Ok(Json(json!({ "authorized": authorized })))
}
