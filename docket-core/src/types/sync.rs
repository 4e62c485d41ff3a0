//! Sync metadata and resync task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::AttestationId;

/// Whether a full reconciliation run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Running,
}

/// Result counts of the last successful full run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub organizations: u64,
    pub documents: u64,
    pub deleted: u64,
}

/// Process-wide sync state singleton.
///
/// Read before every scheduling decision; transitioned to `Running` at
/// the start of a run (via the store's compare-and-swap) and back to
/// `Idle` at the end. A failed run resets to `Idle` without advancing
/// `last_sync_at`, so a crash never blocks future syncs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMeta {
    pub status: SyncStatus,
    /// Timestamp of the last *successful* run
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_counts: SyncCounts,
}

impl Default for SyncMeta {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            last_sync_at: None,
            last_counts: SyncCounts::default(),
        }
    }
}

/// A persisted delayed single-record sync.
///
/// Queued after writes and revocations; drained by the resync worker
/// with at-least-once delivery. Survives restarts under a persistent
/// store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncTask {
    /// Unique task key
    pub task_id: String,
    pub attestation_id: AttestationId,
    pub due_at: DateTime<Utc>,
    /// Delivery attempts so far
    pub attempts: u32,
}

impl ResyncTask {
    /// Create a task due after `delay` from now.
    pub fn new(attestation_id: AttestationId, delay: chrono::Duration) -> Self {
        let due_at = Utc::now() + delay;
        let task_id = format!("{}:{}", attestation_id.as_str(), due_at.timestamp_millis());
        Self {
            task_id,
            attestation_id,
            due_at,
            attempts: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}
