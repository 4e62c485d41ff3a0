//! Document read handlers

use axum::{
    extract::{Path, State},
    Json,
};

use docket_core::AttestationId;

use crate::dto::{DocumentResponse, ListResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list_documents(
    State(state): State<AppState>,
) -> ApiResult<Json<ListResponse<DocumentResponse>>> {
    state.scheduler.trigger_lazy();

    let mut docs = state.store.list_documents().await?;
    docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(ListResponse::new(
        docs.into_iter().map(DocumentResponse::from).collect(),
    )))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentResponse>> {
    let id = AttestationId::parse(&id)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid attestation id: {}", id)))?;
    match state.store.get_document(&id).await? {
        Some(doc) => Ok(Json(doc.into())),
        None => Err(ApiError::NotFound(format!("document {}", id))),
    }
}
