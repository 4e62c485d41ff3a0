//! Application state

use std::env;
use std::sync::Arc;

use docket_ledger::LedgerSource;
use docket_store::CacheStore;
use docket_sync::{ReconcileEngine, ResyncQueue, SyncConfig, SyncScheduler};

use crate::middleware::{RateLimitConfig, RateLimiter};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8720,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - DOCKET_API_HOST: bind address
    /// - DOCKET_API_PORT: bind port
    /// - DOCKET_API_CORS: enable permissive CORS
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("DOCKET_API_HOST").unwrap_or(defaults.host),
            port: env::var("DOCKET_API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            enable_cors: env::var("DOCKET_API_CORS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.enable_cors),
        }
    }
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CacheStore>,
    pub engine: Arc<ReconcileEngine>,
    pub scheduler: Arc<SyncScheduler>,
    pub resync: Arc<ResyncQueue>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CacheStore>,
        ledger: Arc<dyn LedgerSource>,
        sync_config: SyncConfig,
        rate_config: RateLimitConfig,
    ) -> Self {
        let engine = Arc::new(ReconcileEngine::new(
            store.clone(),
            ledger,
            sync_config.clone(),
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            engine.clone(),
            sync_config.sync_interval_secs,
        ));
        let resync = Arc::new(ResyncQueue::new(engine.clone(), &sync_config));
        let rate_limiter = RateLimiter::in_memory(rate_config);

        Self {
            store,
            engine,
            scheduler,
            resync,
            rate_limiter,
        }
    }
}
