//! Docket API service entry point

use std::sync::Arc;

use docket_api::middleware::RateLimitConfig;
use docket_api::{init_tracing, run_server, AppState, ServerConfig};
use docket_ledger::{HttpLedgerClient, LedgerConfig, LedgerSource};
use docket_store::{CacheStore, SledStore};
use docket_sync::SyncConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let data_dir = std::env::var("DOCKET_DATA_DIR").unwrap_or_else(|_| "./docket-data".to_string());
    let store: Arc<dyn CacheStore> = Arc::new(SledStore::open(&data_dir)?);
    let ledger: Arc<dyn LedgerSource> = Arc::new(HttpLedgerClient::new(LedgerConfig::from_env())?);

    let state = AppState::new(
        store,
        ledger,
        SyncConfig::from_env(),
        RateLimitConfig::from_env(),
    );

    run_server(&ServerConfig::from_env(), state).await
}
