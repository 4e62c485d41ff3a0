//! Sled-backed persistent cache store.
//!
//! One tree per collection, JSON-encoded values keyed by attestation id.
//! The sync-status flag lives under its own key so the Idle -> Running
//! transition can use sled's native compare-and-swap, closing the race
//! a read-then-write flag would leave open.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

use docket_core::{
    AttestationId, DocumentRecord, OrganizationRecord, ResyncTask, SyncCounts, SyncMeta,
    SyncStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::{check_batch_size, CacheStore};

const ORGANIZATIONS_TREE: &str = "organizations";
const DOCUMENTS_TREE: &str = "documents";
const META_TREE: &str = "meta";
const RESYNCS_TREE: &str = "resyncs";

const META_KEY: &[u8] = b"sync_meta";
const STATUS_KEY: &[u8] = b"sync_status";
const STATUS_IDLE: &[u8] = b"idle";
const STATUS_RUNNING: &[u8] = b"running";

/// Persistent store over an embedded sled database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
    organizations: sled::Tree,
    documents: sled::Tree,
    meta: sled::Tree,
    resyncs: sled::Tree,
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)
            .map_err(|e| StoreError::Backend(format!("failed to open sled db: {}", e)))?;
        let organizations = db
            .open_tree(ORGANIZATIONS_TREE)
            .map_err(|e| StoreError::Backend(format!("failed to open organizations tree: {}", e)))?;
        let documents = db
            .open_tree(DOCUMENTS_TREE)
            .map_err(|e| StoreError::Backend(format!("failed to open documents tree: {}", e)))?;
        let meta = db
            .open_tree(META_TREE)
            .map_err(|e| StoreError::Backend(format!("failed to open meta tree: {}", e)))?;
        let resyncs = db
            .open_tree(RESYNCS_TREE)
            .map_err(|e| StoreError::Backend(format!("failed to open resyncs tree: {}", e)))?;

        Ok(Self {
            db,
            organizations,
            documents,
            meta,
            resyncs,
        })
    }

    /// Flush dirty pages to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> StoreResult<Option<T>> {
        match tree.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> StoreResult<()> {
        tree.insert(key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn list_json<T: DeserializeOwned>(tree: &sled::Tree) -> StoreResult<Vec<T>> {
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, raw) = entry?;
            out.push(serde_json::from_slice(&raw)?);
        }
        Ok(out)
    }

    fn read_meta(&self) -> StoreResult<SyncMeta> {
        let mut meta: SyncMeta =
            Self::get_json(&self.meta, META_KEY)?.unwrap_or_default();
        // The status flag is authoritative; the JSON blob may lag it.
        meta.status = match self.meta.get(STATUS_KEY)? {
            Some(raw) if raw.as_ref() == STATUS_RUNNING => SyncStatus::Running,
            _ => SyncStatus::Idle,
        };
        Ok(meta)
    }
}

#[async_trait]
impl CacheStore for SledStore {
    async fn get_organization(
        &self,
        id: &AttestationId,
    ) -> StoreResult<Option<OrganizationRecord>> {
        Self::get_json(&self.organizations, id.as_str().as_bytes())
    }

    async fn put_organization(&self, record: &OrganizationRecord) -> StoreResult<()> {
        Self::put_json(
            &self.organizations,
            record.attestation_id.as_str().as_bytes(),
            record,
        )
    }

    async fn put_organizations(&self, records: &[OrganizationRecord]) -> StoreResult<()> {
        check_batch_size(records.len())?;
        let mut batch = sled::Batch::default();
        for record in records {
            batch.insert(
                record.attestation_id.as_str().as_bytes(),
                serde_json::to_vec(record)?,
            );
        }
        self.organizations.apply_batch(batch)?;
        Ok(())
    }

    async fn list_organizations(&self) -> StoreResult<Vec<OrganizationRecord>> {
        Self::list_json(&self.organizations)
    }

    async fn get_document(&self, id: &AttestationId) -> StoreResult<Option<DocumentRecord>> {
        Self::get_json(&self.documents, id.as_str().as_bytes())
    }

    async fn put_document(&self, record: &DocumentRecord) -> StoreResult<()> {
        Self::put_json(
            &self.documents,
            record.attestation_id.as_str().as_bytes(),
            record,
        )
    }

    async fn put_documents(&self, records: &[DocumentRecord]) -> StoreResult<()> {
        check_batch_size(records.len())?;
        let mut batch = sled::Batch::default();
        for record in records {
            batch.insert(
                record.attestation_id.as_str().as_bytes(),
                serde_json::to_vec(record)?,
            );
        }
        self.documents.apply_batch(batch)?;
        Ok(())
    }

    async fn delete_documents(&self, ids: &[AttestationId]) -> StoreResult<()> {
        check_batch_size(ids.len())?;
        let mut batch = sled::Batch::default();
        for id in ids {
            batch.remove(id.as_str().as_bytes());
        }
        self.documents.apply_batch(batch)?;
        Ok(())
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentRecord>> {
        Self::list_json(&self.documents)
    }

    async fn list_documents_by_organization(
        &self,
        organization_id: &AttestationId,
    ) -> StoreResult<Vec<DocumentRecord>> {
        let all: Vec<DocumentRecord> = Self::list_json(&self.documents)?;
        Ok(all
            .into_iter()
            .filter(|d| &d.organization_id == organization_id)
            .collect())
    }

    async fn get_sync_meta(&self) -> StoreResult<SyncMeta> {
        self.read_meta()
    }

    async fn try_begin_sync(&self) -> StoreResult<bool> {
        let current = self.meta.get(STATUS_KEY)?;
        if current.as_ref().map(|v| v.as_ref()) == Some(STATUS_RUNNING) {
            return Ok(false);
        }
        let swapped = self.meta.compare_and_swap(
            STATUS_KEY,
            current.as_ref().map(|v| v.as_ref()),
            Some(STATUS_RUNNING),
        )?;
        // Losing the swap means another process claimed the run.
        Ok(swapped.is_ok())
    }

    async fn finish_sync(&self, counts: SyncCounts, at: DateTime<Utc>) -> StoreResult<()> {
        let meta = SyncMeta {
            status: SyncStatus::Idle,
            last_sync_at: Some(at),
            last_counts: counts,
        };
        Self::put_json(&self.meta, META_KEY, &meta)?;
        self.meta.insert(STATUS_KEY, STATUS_IDLE)?;
        Ok(())
    }

    async fn reset_sync_status(&self) -> StoreResult<()> {
        self.meta.insert(STATUS_KEY, STATUS_IDLE)?;
        Ok(())
    }

    async fn enqueue_resync(&self, task: &ResyncTask) -> StoreResult<()> {
        Self::put_json(&self.resyncs, task.task_id.as_bytes(), task)
    }

    async fn due_resyncs(&self, now: DateTime<Utc>) -> StoreResult<Vec<ResyncTask>> {
        let all: Vec<ResyncTask> = Self::list_json(&self.resyncs)?;
        let mut due: Vec<ResyncTask> = all.into_iter().filter(|t| t.is_due(now)).collect();
        due.sort_by_key(|t| t.due_at);
        Ok(due)
    }

    async fn delete_resync(&self, task_id: &str) -> StoreResult<()> {
        self.resyncs.remove(task_id.as_bytes())?;
        Ok(())
    }
}
