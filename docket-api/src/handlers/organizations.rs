//! Organization read handlers
//!
//! Reads come straight from the cache; each list access also gives the
//! scheduler a chance to kick off a background run if the cache is stale.

use axum::{
    extract::{Path, State},
    Json,
};

use docket_core::AttestationId;

use crate::dto::{DocumentResponse, ListResponse, OrganizationResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn parse_id(raw: &str) -> Result<AttestationId, ApiError> {
    AttestationId::parse(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid attestation id: {}", raw)))
}

pub async fn list_organizations(
    State(state): State<AppState>,
) -> ApiResult<Json<ListResponse<OrganizationResponse>>> {
    state.scheduler.trigger_lazy();

    let mut orgs = state.store.list_organizations().await?;
    orgs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(ListResponse::new(
        orgs.into_iter().map(OrganizationResponse::from).collect(),
    )))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OrganizationResponse>> {
    let id = parse_id(&id)?;
    match state.store.get_organization(&id).await? {
        Some(org) => Ok(Json(org.into())),
        None => Err(ApiError::NotFound(format!("organization {}", id))),
    }
}

pub async fn list_organization_documents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ListResponse<DocumentResponse>>> {
    let id = parse_id(&id)?;
    if state.store.get_organization(&id).await?.is_none() {
        return Err(ApiError::NotFound(format!("organization {}", id)));
    }

    let mut docs = state.store.list_documents_by_organization(&id).await?;
    docs.sort_by(|a, b| b.version.cmp(&a.version).then(b.created_at.cmp(&a.created_at)));
    Ok(Json(ListResponse::new(
        docs.into_iter().map(DocumentResponse::from).collect(),
    )))
}
