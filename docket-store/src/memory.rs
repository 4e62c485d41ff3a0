//! In-memory cache store.
//!
//! Thread-safe implementation over RwLock-protected maps, used by tests
//! and single-process development setups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use docket_core::{
    AttestationId, DocumentRecord, OrganizationRecord, ResyncTask, SyncCounts, SyncMeta,
    SyncStatus,
};

use crate::error::StoreResult;
use crate::{check_batch_size, CacheStore};

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    organizations: Arc<RwLock<HashMap<AttestationId, OrganizationRecord>>>,
    documents: Arc<RwLock<HashMap<AttestationId, DocumentRecord>>>,
    // Mutex rather than RwLock: try_begin_sync must check-and-set under
    // one critical section.
    meta: Arc<Mutex<SyncMeta>>,
    resyncs: Arc<RwLock<HashMap<String, ResyncTask>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all data, including sync state.
    pub async fn clear(&self) {
        self.organizations.write().await.clear();
        self.documents.write().await.clear();
        *self.meta.lock().await = SyncMeta::default();
        self.resyncs.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_organization(
        &self,
        id: &AttestationId,
    ) -> StoreResult<Option<OrganizationRecord>> {
        Ok(self.organizations.read().await.get(id).cloned())
    }

    async fn put_organization(&self, record: &OrganizationRecord) -> StoreResult<()> {
        self.organizations
            .write()
            .await
            .insert(record.attestation_id.clone(), record.clone());
        Ok(())
    }

    async fn put_organizations(&self, records: &[OrganizationRecord]) -> StoreResult<()> {
        check_batch_size(records.len())?;
        let mut organizations = self.organizations.write().await;
        for record in records {
            organizations.insert(record.attestation_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn list_organizations(&self) -> StoreResult<Vec<OrganizationRecord>> {
        Ok(self.organizations.read().await.values().cloned().collect())
    }

    async fn get_document(&self, id: &AttestationId) -> StoreResult<Option<DocumentRecord>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn put_document(&self, record: &DocumentRecord) -> StoreResult<()> {
        self.documents
            .write()
            .await
            .insert(record.attestation_id.clone(), record.clone());
        Ok(())
    }

    async fn put_documents(&self, records: &[DocumentRecord]) -> StoreResult<()> {
        check_batch_size(records.len())?;
        let mut documents = self.documents.write().await;
        for record in records {
            documents.insert(record.attestation_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_documents(&self, ids: &[AttestationId]) -> StoreResult<()> {
        check_batch_size(ids.len())?;
        let mut documents = self.documents.write().await;
        for id in ids {
            documents.remove(id);
        }
        Ok(())
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentRecord>> {
        Ok(self.documents.read().await.values().cloned().collect())
    }

    async fn list_documents_by_organization(
        &self,
        organization_id: &AttestationId,
    ) -> StoreResult<Vec<DocumentRecord>> {
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|d| &d.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn get_sync_meta(&self) -> StoreResult<SyncMeta> {
        Ok(self.meta.lock().await.clone())
    }

    async fn try_begin_sync(&self) -> StoreResult<bool> {
        let mut meta = self.meta.lock().await;
        if meta.status == SyncStatus::Running {
            return Ok(false);
        }
        meta.status = SyncStatus::Running;
        Ok(true)
    }

    async fn finish_sync(&self, counts: SyncCounts, at: DateTime<Utc>) -> StoreResult<()> {
        let mut meta = self.meta.lock().await;
        meta.status = SyncStatus::Idle;
        meta.last_sync_at = Some(at);
        meta.last_counts = counts;
        Ok(())
    }

    async fn reset_sync_status(&self) -> StoreResult<()> {
        let mut meta = self.meta.lock().await;
        meta.status = SyncStatus::Idle;
        Ok(())
    }

    async fn enqueue_resync(&self, task: &ResyncTask) -> StoreResult<()> {
        self.resyncs
            .write()
            .await
            .insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn due_resyncs(&self, now: DateTime<Utc>) -> StoreResult<Vec<ResyncTask>> {
        let mut due: Vec<ResyncTask> = self
            .resyncs
            .read()
            .await
            .values()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.due_at);
        Ok(due)
    }

    async fn delete_resync(&self, task_id: &str) -> StoreResult<()> {
        self.resyncs.write().await.remove(task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use docket_core::constants::MAX_BATCH_WRITE;
    use docket_core::{Address, DocumentGeneration, DocumentStatus};

    fn doc(id_byte: &str, org_byte: &str) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            attestation_id: AttestationId::parse(&id_byte.repeat(32)).unwrap(),
            title: "t".to_string(),
            document_type: "contract".to_string(),
            content_hash: "h".to_string(),
            content_ref: "r".to_string(),
            version: 1,
            previous_version_id: None,
            status: DocumentStatus::Active,
            attester: Address::parse(&format!("0x{}", "aa".repeat(20))).unwrap(),
            organization_id: AttestationId::parse(&org_byte.repeat(32)).unwrap(),
            voting_tx_hash: None,
            schema_version: DocumentGeneration::V3Current,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_document_upsert_and_delete() {
        let store = MemoryStore::new();
        let d = doc("11", "aa");
        store.put_document(&d).await.unwrap();
        store.put_document(&d).await.unwrap(); // idempotent upsert
        assert_eq!(store.list_documents().await.unwrap().len(), 1);

        store
            .delete_documents(&[d.attestation_id.clone()])
            .await
            .unwrap();
        assert!(store.get_document(&d.attestation_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_organization() {
        let store = MemoryStore::new();
        store.put_document(&doc("11", "aa")).await.unwrap();
        store.put_document(&doc("22", "aa")).await.unwrap();
        store.put_document(&doc("33", "bb")).await.unwrap();

        let org = AttestationId::parse(&"aa".repeat(32)).unwrap();
        assert_eq!(
            store.list_documents_by_organization(&org).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_batch_limit_enforced() {
        let store = MemoryStore::new();
        let batch: Vec<DocumentRecord> = (0..=MAX_BATCH_WRITE).map(|_| doc("11", "aa")).collect();
        let err = store.put_documents(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_sync_meta_cas() {
        let store = MemoryStore::new();
        assert!(store.try_begin_sync().await.unwrap());
        // Second begin while running must no-op.
        assert!(!store.try_begin_sync().await.unwrap());

        let at = Utc::now();
        store
            .finish_sync(
                SyncCounts {
                    organizations: 2,
                    documents: 3,
                    deleted: 1,
                },
                at,
            )
            .await
            .unwrap();
        let meta = store.get_sync_meta().await.unwrap();
        assert_eq!(meta.status, SyncStatus::Idle);
        assert_eq!(meta.last_sync_at, Some(at));
        assert_eq!(meta.last_counts.documents, 3);

        // Begin again, then fail: status resets without a new timestamp.
        assert!(store.try_begin_sync().await.unwrap());
        store.reset_sync_status().await.unwrap();
        let meta = store.get_sync_meta().await.unwrap();
        assert_eq!(meta.status, SyncStatus::Idle);
        assert_eq!(meta.last_sync_at, Some(at));
    }

    #[tokio::test]
    async fn test_resync_queue_due_ordering() {
        let store = MemoryStore::new();
        let id = AttestationId::parse(&"11".repeat(32)).unwrap();
        let late = ResyncTask::new(id.clone(), chrono::Duration::seconds(-5));
        let early = ResyncTask::new(id.clone(), chrono::Duration::seconds(-50));
        let future = ResyncTask::new(id, chrono::Duration::seconds(600));
        store.enqueue_resync(&late).await.unwrap();
        store.enqueue_resync(&early).await.unwrap();
        store.enqueue_resync(&future).await.unwrap();

        let due = store.due_resyncs(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].task_id, early.task_id);

        store.delete_resync(&early.task_id).await.unwrap();
        assert_eq!(store.due_resyncs(Utc::now()).await.unwrap().len(), 1);
    }
}
