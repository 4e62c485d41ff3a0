//! Sync error type

use docket_ledger::LedgerError;
use docket_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("a sync run is already in progress")]
    AlreadyRunning,
}

pub type SyncResult<T> = Result<T, SyncError>;
