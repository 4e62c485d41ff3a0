//! Cache store for the Docket registry.
//!
//! The cache is the only shared mutable resource in the system: two
//! entity collections (organizations, documents), a singleton SyncMeta
//! document, and the persisted resync queue. All entity writes are
//! upserts keyed by attestation id, so concurrent partial runs are
//! commutative and convergent.
//!
//! Backends:
//! - [`MemoryStore`] - RwLock-protected maps, for tests and development
//! - [`SledStore`] - embedded persistent store, tree per collection

pub mod error;
pub mod memory;
pub mod sled_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use docket_core::constants::MAX_BATCH_WRITE;
use docket_core::{
    AttestationId, DocumentRecord, OrganizationRecord, ResyncTask, SyncCounts, SyncMeta,
};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Cache store interface.
///
/// Point reads, merge-capable point writes, bounded batch commits, and
/// the SyncMeta lifecycle. Batch operations reject inputs larger than
/// [`MAX_BATCH_WRITE`]; chunking is the caller's job.
#[async_trait]
pub trait CacheStore: Send + Sync {
    // ==================== Organizations ====================

    async fn get_organization(
        &self,
        id: &AttestationId,
    ) -> StoreResult<Option<OrganizationRecord>>;

    async fn put_organization(&self, record: &OrganizationRecord) -> StoreResult<()>;

    /// Batch upsert, bounded by [`MAX_BATCH_WRITE`].
    async fn put_organizations(&self, records: &[OrganizationRecord]) -> StoreResult<()>;

    async fn list_organizations(&self) -> StoreResult<Vec<OrganizationRecord>>;

    // ==================== Documents ====================

    async fn get_document(&self, id: &AttestationId) -> StoreResult<Option<DocumentRecord>>;

    async fn put_document(&self, record: &DocumentRecord) -> StoreResult<()>;

    /// Batch upsert, bounded by [`MAX_BATCH_WRITE`].
    async fn put_documents(&self, records: &[DocumentRecord]) -> StoreResult<()>;

    /// Batch delete, bounded by [`MAX_BATCH_WRITE`]. Missing ids are
    /// not an error.
    async fn delete_documents(&self, ids: &[AttestationId]) -> StoreResult<()>;

    async fn list_documents(&self) -> StoreResult<Vec<DocumentRecord>>;

    async fn list_documents_by_organization(
        &self,
        organization_id: &AttestationId,
    ) -> StoreResult<Vec<DocumentRecord>>;

    // ==================== Sync metadata ====================

    async fn get_sync_meta(&self) -> StoreResult<SyncMeta>;

    /// Atomically transition SyncMeta Idle -> Running.
    ///
    /// Returns `false` when a run is already in flight; the caller must
    /// then no-op rather than queue or overlap.
    async fn try_begin_sync(&self) -> StoreResult<bool>;

    /// Record a successful run: Idle, new timestamp, counts.
    async fn finish_sync(&self, counts: SyncCounts, at: DateTime<Utc>) -> StoreResult<()>;

    /// Reset status to Idle without touching the last-success timestamp.
    /// Called on the failure path so a crashed run never wedges the
    /// scheduler.
    async fn reset_sync_status(&self) -> StoreResult<()>;

    // ==================== Resync queue ====================

    async fn enqueue_resync(&self, task: &ResyncTask) -> StoreResult<()>;

    /// Tasks whose `due_at` has passed, oldest first.
    async fn due_resyncs(&self, now: DateTime<Utc>) -> StoreResult<Vec<ResyncTask>>;

    async fn delete_resync(&self, task_id: &str) -> StoreResult<()>;
}

/// Shared batch-size guard for store implementations.
pub(crate) fn check_batch_size(len: usize) -> StoreResult<()> {
    if len > MAX_BATCH_WRITE {
        return Err(StoreError::BatchTooLarge {
            size: len,
            limit: MAX_BATCH_WRITE,
        });
    }
    Ok(())
}
