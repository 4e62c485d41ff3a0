//! Sync handlers

use axum::{extract::State, Extension, Json};

use docket_core::AttestationId;

use crate::dto::{SyncRecordRequest, SyncRecordResponse, SyncStatusResponse, TriggerSyncResponse};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedWallet;
use crate::state::AppState;

pub async fn sync_status(State(state): State<AppState>) -> ApiResult<Json<SyncStatusResponse>> {
    let meta = state.store.get_sync_meta().await?;
    Ok(Json(meta.into()))
}

/// Explicit full-run trigger. `started: false` means a run was already
/// in progress; callers poll `/sync/status` either way.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Extension(wallet): Extension<AuthenticatedWallet>,
) -> ApiResult<Json<TriggerSyncResponse>> {
    tracing::info!(wallet = %wallet.0, "Full sync requested");
    let report = state.scheduler.trigger_now().await?;
    Ok(Json(TriggerSyncResponse {
        started: report.is_some(),
        report,
    }))
}

/// Single-record sync for low-latency cache updates after a write.
///
/// Runs once inline and leaves a delayed follow-up task in the resync
/// queue to absorb ledger index lag.
pub async fn sync_record(
    State(state): State<AppState>,
    Extension(wallet): Extension<AuthenticatedWallet>,
    Json(body): Json<SyncRecordRequest>,
) -> ApiResult<Json<SyncRecordResponse>> {
    let id = AttestationId::parse(&body.attestation_id).ok_or_else(|| {
        ApiError::BadRequest(format!("invalid attestation id: {}", body.attestation_id))
    })?;
    tracing::info!(wallet = %wallet.0, attestation_id = %id, "Record sync requested");

    let outcome = state.engine.sync_one(&id).await?;
    if let Err(e) = state.resync.enqueue_follow_up(&id).await {
        tracing::warn!(attestation_id = %id, error = %e, "Could not enqueue follow-up resync");
    }

    Ok(Json(SyncRecordResponse {
        attestation_id: id.as_str().to_string(),
        outcome,
    }))
}
