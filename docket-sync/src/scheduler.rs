//! Sync scheduling
//!
//! Full runs are triggered two ways: lazily from the read path when the
//! cache is older than the sync interval, and explicitly from the API.
//! The lazy trigger is fire-and-forget with a process-wide in-flight
//! guard so read traffic never stacks up concurrent runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use docket_core::{SyncMeta, SyncStatus};
use docket_store::CacheStore;

use crate::engine::{ReconcileEngine, SyncReport};
use crate::error::{SyncError, SyncResult};

/// Whether a full run is due.
///
/// Never while one is running; always when there is no prior success;
/// otherwise when the last success is older than `interval_secs`.
pub fn should_run_full_sync(meta: &SyncMeta, now: DateTime<Utc>, interval_secs: u64) -> bool {
    if meta.status == SyncStatus::Running {
        return false;
    }
    match meta.last_sync_at {
        None => true,
        Some(last) => now - last > Duration::seconds(interval_secs as i64),
    }
}

/// Coordinates full-run triggers around a shared engine.
pub struct SyncScheduler {
    engine: Arc<ReconcileEngine>,
    store: Arc<dyn CacheStore>,
    interval_secs: u64,
    lazy_in_flight: Arc<AtomicBool>,
}

impl SyncScheduler {
    pub fn new(engine: Arc<ReconcileEngine>, interval_secs: u64) -> Self {
        let store = engine.store().clone();
        Self {
            engine,
            store,
            interval_secs,
            lazy_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Kick off a background full run if the cache is stale.
    ///
    /// At most one lazy trigger is in flight at a time; the spawned task
    /// releases the guard on every exit path and never propagates errors
    /// to the caller.
    pub fn trigger_lazy(&self) {
        if self.lazy_in_flight.swap(true, Ordering::SeqCst) {
            return;
        }
        let engine = self.engine.clone();
        let store = self.store.clone();
        let interval_secs = self.interval_secs;
        let guard = self.lazy_in_flight.clone();
        tokio::spawn(async move {
            let due = match store.get_sync_meta().await {
                Ok(meta) => should_run_full_sync(&meta, Utc::now(), interval_secs),
                Err(e) => {
                    warn!(error = %e, "Could not read sync metadata for lazy trigger");
                    false
                }
            };
            if due {
                match engine.full_sync().await {
                    Ok(report) => info!(
                        organizations = report.organizations,
                        documents = report.documents,
                        "Lazy full sync finished"
                    ),
                    Err(SyncError::AlreadyRunning) => {
                        debug!("Lazy full sync skipped, run already in progress")
                    }
                    Err(e) => warn!(error = %e, "Lazy full sync failed"),
                }
            }
            guard.store(false, Ordering::SeqCst);
        });
    }

    /// Explicit trigger. `Ok(None)` means a run was already in progress.
    pub async fn trigger_now(&self) -> SyncResult<Option<SyncReport>> {
        match self.engine.full_sync().await {
            Ok(report) => Ok(Some(report)),
            Err(SyncError::AlreadyRunning) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::SyncCounts;

    #[test]
    fn test_due_with_no_prior_success() {
        let meta = SyncMeta::default();
        assert!(should_run_full_sync(&meta, Utc::now(), 3600));
    }

    #[test]
    fn test_not_due_while_running() {
        let meta = SyncMeta {
            status: SyncStatus::Running,
            last_sync_at: None,
            last_counts: SyncCounts::default(),
        };
        assert!(!should_run_full_sync(&meta, Utc::now(), 3600));
    }

    #[test]
    fn test_due_after_interval_elapses() {
        let now = Utc::now();
        let meta = SyncMeta {
            status: SyncStatus::Idle,
            last_sync_at: Some(now - Duration::seconds(3601)),
            last_counts: SyncCounts::default(),
        };
        assert!(should_run_full_sync(&meta, now, 3600));

        let fresh = SyncMeta {
            last_sync_at: Some(now - Duration::seconds(60)),
            ..meta
        };
        assert!(!should_run_full_sync(&fresh, now, 3600));
    }
}
