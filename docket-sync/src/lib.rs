//! Docket reconciliation engine
//!
//! Derives the queryable cache from the attestation ledger: full
//! reconciliation runs, single-record sync, interval-based scheduling,
//! and a persisted delayed-resync queue.

pub mod config;
pub mod engine;
pub mod error;
pub mod resync;
pub mod scheduler;
pub mod version;

pub use config::SyncConfig;
pub use engine::{ReconcileEngine, SyncOutcome, SyncReport};
pub use error::{SyncError, SyncResult};
pub use resync::ResyncQueue;
pub use scheduler::{should_run_full_sync, SyncScheduler};
pub use version::{resolve_version_single, VersionResolver};
