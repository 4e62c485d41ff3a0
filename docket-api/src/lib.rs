//! Docket registry HTTP API
//!
//! Read endpoints over the derived cache, sync triggers gated by wallet
//! authentication and rate limiting, and the background workers that
//! keep the cache converging on the ledger.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use router::create_router;
pub use server::{create_server, init_tracing, run_server, start_background_server};
pub use state::{AppState, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
