//! API router
//!
//! Read endpoints are open; the sync triggers are wrapped in wallet
//! authentication and rate limiting.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware, state::AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    // Rate limiting sits outside wallet auth so unauthenticated floods
    // are rejected before any signature verification work.
    let write_routes = Router::new()
        .route("/api/v1/sync", post(handlers::trigger_sync))
        .route("/api/v1/sync/record", post(handlers::sync_record))
        .layer(from_fn(middleware::wallet_auth))
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            middleware::rate_limit,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        // Organization endpoints
        .route("/api/v1/organizations", get(handlers::list_organizations))
        .route("/api/v1/organizations/:id", get(handlers::get_organization))
        .route(
            "/api/v1/organizations/:id/documents",
            get(handlers::list_organization_documents),
        )
        // Document endpoints
        .route("/api/v1/documents", get(handlers::list_documents))
        .route("/api/v1/documents/:id", get(handlers::get_document))
        // Sync endpoints
        .route("/api/v1/sync/status", get(handlers::sync_status))
        .merge(write_routes)
        .with_state(state)
}
