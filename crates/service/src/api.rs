//! REST API Endpoints
//!
//! Health, status, allowlist administration, access requests, proofs and
//! mint eligibility.

use crate::state::{AppState, PublicationCounts, PublicationRecord};
use allowlist_core::{
    Address, AllowlistContract, AllowlistError, AllowlistSnapshot, ImportMode, ImportPayload,
    ImportSummary, MintEligibility, MutationOutcome, PendingRequest, ProofBundle, Publication,
    SyncReport, TxReceipt,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Run the API server
pub async fn run_server<C: AllowlistContract + 'static>(
    listen: String,
    state: AppState<C>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(address = %listen, "API server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub fn create_router<C: AllowlistContract + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/health", get(health::<C>))
        .route("/status", get(status::<C>))
        .route("/allowlist", get(list_members::<C>).post(add_members::<C>))
        .route("/allowlist/export", get(export::<C>))
        .route("/allowlist/import", post(import::<C>))
        .route("/allowlist/reload", post(reload::<C>))
        .route("/allowlist/{address}", delete(remove_member::<C>))
        .route("/allowlist/{address}/proof", get(proof::<C>))
        .route("/eligibility/{address}", get(eligibility::<C>))
        .route("/requests", get(list_requests::<C>).post(submit_request::<C>))
        .route("/requests/{id}/approve", post(approve_request::<C>))
        .route("/requests/{id}/reject", post(reject_request::<C>))
        .route("/publish", post(publish::<C>))
        .route("/whitelist-only", post(set_whitelist_only::<C>))
        .route("/publications", get(publications::<C>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response carrying the allowlist error kind
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] AllowlistError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AllowlistError::InvalidAddressFormat(_) => StatusCode::BAD_REQUEST,
            AllowlistError::NoValidAddresses => StatusCode::UNPROCESSABLE_ENTITY,
            AllowlistError::EmptyAllowlist
            | AllowlistError::LeafNotFound(_)
            | AllowlistError::RequestNotFound(_) => StatusCode::NOT_FOUND,
            AllowlistError::UnauthorizedOperation { .. } => StatusCode::FORBIDDEN,
            AllowlistError::RootMismatch { .. }
            | AllowlistError::VerificationFailed(_)
            | AllowlistError::StoreVersionConflict { .. } => StatusCode::CONFLICT,
            AllowlistError::Contract(_) => StatusCode::BAD_GATEWAY,
            AllowlistError::Persistence(_) | AllowlistError::StoreTask(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    last_error: Option<String>,
}

/// Health check endpoint
async fn health<C: AllowlistContract>(
    State(state): State<AppState<C>>,
) -> (StatusCode, Json<HealthResponse>) {
    let healthy = state.is_healthy();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        last_error: state.last_error(),
    };

    (status_code, Json(response))
}

/// Status response
#[derive(Serialize)]
struct StatusResponse {
    uptime_secs: u64,
    members: usize,
    pending_requests: usize,
    store_version: u64,
    /// `None` when the chain could not be read
    sync: Option<SyncReport>,
    publications: PublicationCounts,
    last_error: Option<String>,
}

/// Status endpoint
async fn status<C: AllowlistContract>(State(state): State<AppState<C>>) -> Json<StatusResponse> {
    let sync = match state.manager().sync_report().await {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read on-chain root");
            state.set_error(Some(e.to_string()));
            None
        }
    };

    let (members, pending_requests, store_version) = state.manager().read(|store| {
        (store.len(), store.pending_requests().len(), store.version())
    });

    Json(StatusResponse {
        uptime_secs: state.uptime_secs(),
        members,
        pending_requests,
        store_version,
        sync,
        publications: state.publication_counts(),
        last_error: state.last_error(),
    })
}

/// Members and local root
#[derive(Serialize)]
struct MembersResponse {
    count: usize,
    root: Option<String>,
    members: Vec<Address>,
}

async fn list_members<C: AllowlistContract>(
    State(state): State<AppState<C>>,
) -> Json<MembersResponse> {
    let (members, root) = state
        .manager()
        .read(|store| (store.list(), store.root()));
    Json(MembersResponse {
        count: members.len(),
        root: root.as_ref().map(allowlist_core::to_hex),
        members,
    })
}

#[derive(Deserialize)]
struct AddRequest {
    addresses: Vec<String>,
}

async fn add_members<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Json(body): Json<AddRequest>,
) -> ApiResult<MutationOutcome<usize>> {
    let outcome = state.manager().add_many(&body.addresses).await?;
    state.record_mutation("add", outcome.publication.as_ref());
    Ok(Json(outcome))
}

async fn remove_member<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Path(address): Path<String>,
) -> ApiResult<MutationOutcome<bool>> {
    let outcome = state.manager().remove(&address).await?;
    state.record_mutation("remove", outcome.publication.as_ref());
    Ok(Json(outcome))
}

/// Re-read the store after another writer changed it
async fn reload<C: AllowlistContract>(
    State(state): State<AppState<C>>,
) -> ApiResult<MembersResponse> {
    state.manager().reload().await?;
    state.refresh_gauges();
    Ok(list_members(State(state)).await)
}

async fn export<C: AllowlistContract>(State(state): State<AppState<C>>) -> Json<AllowlistSnapshot> {
    Json(state.manager().export())
}

#[derive(Deserialize)]
struct ImportQuery {
    #[serde(default)]
    mode: ImportMode,
}

async fn import<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Query(query): Query<ImportQuery>,
    Json(payload): Json<ImportPayload>,
) -> ApiResult<MutationOutcome<ImportSummary>> {
    let outcome = state
        .manager()
        .import(&payload.addresses, query.mode)
        .await?;
    state.record_mutation("import", outcome.publication.as_ref());
    Ok(Json(outcome))
}

async fn proof<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Path(address): Path<String>,
) -> ApiResult<ProofBundle> {
    Ok(Json(state.manager().proof(&address)?))
}

#[derive(Deserialize, Default)]
struct EligibilityQuery {
    /// Fail with 409 instead of returning advisories
    #[serde(default)]
    strict: bool,
}

async fn eligibility<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Path(address): Path<String>,
    Query(query): Query<EligibilityQuery>,
) -> ApiResult<MintEligibility> {
    let check = state.manager().check_mint(&address).await?;
    if query.strict {
        return Ok(Json(check.ensure_clean()?));
    }
    Ok(Json(check))
}

async fn list_requests<C: AllowlistContract>(
    State(state): State<AppState<C>>,
) -> Json<Vec<PendingRequest>> {
    Json(state.manager().pending_requests())
}

#[derive(Deserialize)]
struct AccessRequest {
    address: String,
    #[serde(default)]
    reason: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    queued: bool,
}

async fn submit_request<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Json(body): Json<AccessRequest>,
) -> ApiResult<SubmitResponse> {
    let queued = state
        .manager()
        .submit_request(&body.address, &body.reason)
        .await?;
    state.refresh_gauges();
    Ok(Json(SubmitResponse { queued }))
}

async fn approve_request<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ApiResult<MutationOutcome<PendingRequest>> {
    let outcome = state.manager().approve(&id).await?;
    state.record_mutation("approve", outcome.publication.as_ref());
    Ok(Json(outcome))
}

async fn reject_request<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ApiResult<PendingRequest> {
    let request = state.manager().reject(&id).await?;
    state.record_mutation("reject", None);
    Ok(Json(request))
}

async fn publish<C: AllowlistContract>(State(state): State<AppState<C>>) -> ApiResult<Publication> {
    let publication = state.manager().publish().await?;
    state.record_publication("publish", publication.clone());
    Ok(Json(publication))
}

#[derive(Deserialize)]
struct WhitelistOnlyRequest {
    enabled: bool,
}

#[derive(Serialize)]
struct WhitelistOnlyResponse {
    enabled: bool,
    tx_hash: String,
    success: bool,
}

async fn set_whitelist_only<C: AllowlistContract>(
    State(state): State<AppState<C>>,
    Json(body): Json<WhitelistOnlyRequest>,
) -> ApiResult<WhitelistOnlyResponse> {
    let TxReceipt { tx_hash, success } =
        state.manager().set_whitelist_only(body.enabled).await?;
    Ok(Json(WhitelistOnlyResponse {
        enabled: body.enabled,
        tx_hash: allowlist_core::to_hex(&tx_hash),
        success,
    }))
}

async fn publications<C: AllowlistContract>(
    State(state): State<AppState<C>>,
) -> Json<Vec<PublicationRecord>> {
    Json(state.publications())
}
