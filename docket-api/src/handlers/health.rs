//! Health handler

use axum::Json;
use chrono::Utc;

use crate::dto::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        timestamp: Utc::now(),
    })
}
