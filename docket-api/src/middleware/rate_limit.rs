//! Rate limiting middleware
//!
//! Fixed-window counting keyed by client IP. The counter storage is
//! injected behind [`RateLimitStore`] so a multi-instance deployment can
//! share windows through an external cache instead of silently running
//! one limiter per process.

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ErrorResponse;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Window length in milliseconds
    pub window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - DOCKET_RATE_LIMIT_MAX: requests per window
    /// - DOCKET_RATE_LIMIT_WINDOW_MS: window length
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: env::var("DOCKET_RATE_LIMIT_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_requests),
            window_ms: env::var("DOCKET_RATE_LIMIT_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.window_ms),
        }
    }
}

/// Counter storage behind the limiter.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record a hit for `key` in the window starting at `window_start_ms`
    /// and return the hit count for that window, this hit included.
    async fn hit(&self, key: &str, window_start_ms: i64) -> u32;

    /// Drop windows that started before `horizon_ms`.
    async fn evict_before(&self, horizon_ms: i64);
}

/// In-memory window counters for single-instance deployments.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: RwLock<HashMap<String, (i64, u32)>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window_start_ms: i64) -> u32 {
        let mut windows = self.windows.write().await;
        let slot = windows.entry(key.to_string()).or_insert((window_start_ms, 0));
        if slot.0 != window_start_ms {
            *slot = (window_start_ms, 0);
        }
        slot.1 += 1;
        slot.1
    }

    async fn evict_before(&self, horizon_ms: i64) {
        let mut windows = self.windows.write().await;
        windows.retain(|_, (start, _)| *start >= horizon_ms);
    }
}

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_ms: i64,
}

/// Fixed-window rate limiter service.
#[derive(Clone)]
pub struct RateLimiter {
    config: Arc<RateLimitConfig>,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(MemoryRateLimitStore::new()))
    }

    pub fn max_requests(&self) -> u32 {
        self.config.max_requests
    }

    /// Count a hit against `client_key`'s current window.
    pub async fn check(&self, client_key: &str, now_ms: i64) -> Decision {
        let window_ms = self.config.window_ms.max(1);
        let window_start = now_ms - now_ms.rem_euclid(window_ms);
        let count = self.store.hit(client_key, window_start).await;
        let allowed = count <= self.config.max_requests;
        Decision {
            allowed,
            remaining: self.config.max_requests.saturating_sub(count),
            retry_after_ms: if allowed {
                0
            } else {
                window_start + window_ms - now_ms
            },
        }
    }

    /// Spawn the periodic eviction task for expired windows.
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let window_ms = self.config.window_ms.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(
                (window_ms as u64) * 2,
            ));
            loop {
                ticker.tick().await;
                let horizon = Utc::now().timestamp_millis() - window_ms;
                store.evict_before(horizon).await;
            }
        })
    }
}

/// 429 response with standard rate-limit headers.
#[derive(Debug)]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub retry_after_ms: i64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let retry_after_secs = (self.retry_after_ms as f64 / 1000.0).ceil() as i64;
        let body = ErrorResponse {
            code: "RATE_LIMITED".to_string(),
            message: format!(
                "Rate limit exceeded. Retry after {} seconds",
                retry_after_secs
            ),
            details: Some(serde_json::json!({
                "retry_after_seconds": retry_after_secs,
                "limit": self.limit,
            })),
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        if let Ok(v) = self.limit.to_string().parse() {
            headers.insert("X-RateLimit-Limit", v);
        }
        if let Ok(v) = "0".parse() {
            headers.insert("X-RateLimit-Remaining", v);
        }
        if let Ok(v) = retry_after_secs.to_string().parse() {
            headers.insert("Retry-After", v);
        }
        response
    }
}

fn client_key(connect_info: Option<&ConnectInfo<SocketAddr>>, request: &Request) -> String {
    if let Some(ci) = connect_info {
        return ci.0.ip().to_string();
    }
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limit middleware for write endpoints.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let key = client_key(connect_info.as_ref(), &request);
    let decision = limiter.check(&key, Utc::now().timestamp_millis()).await;

    if !decision.allowed {
        return Err(RateLimitExceeded {
            limit: limiter.max_requests(),
            retry_after_ms: decision.retry_after_ms,
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(v) = limiter.max_requests().to_string().parse() {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = decision.remaining.to_string().parse() {
        headers.insert("X-RateLimit-Remaining", v);
    }
    Ok(response)
}
