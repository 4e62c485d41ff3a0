//! Reconciliation engine
//!
//! Rebuilds the queryable cache from the attestation ledger. A full run
//! fetches both schemas (revoked records included so revocations
//! propagate), decodes and merges organizations, enforces the
//! document-authorization invariant, resolves version chains, commits in
//! bounded batches, and deletes cache entries whose attestation no longer
//! yields an accepted record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use docket_core::{
    decode_document, decode_organization, Address, Attestation, AttestationId, DocumentRecord,
    OrganizationRecord, SyncCounts,
};
use docket_ledger::LedgerSource;
use docket_store::CacheStore;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::version::{resolve_version_single, VersionResolver};

/// Outcome of a full reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub organizations: u64,
    pub documents: u64,
    pub rejected_documents: u64,
    pub deleted: u64,
    pub chunk_errors: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of a single-record sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Cached as an organization
    Organization,
    /// Cached as a document
    Document,
    /// Document failed the authorization check and was not cached
    Rejected,
    /// Undecodable payload or unrecognised schema
    Skipped,
    /// No such attestation on the ledger
    NotFound,
}

/// Drives reconciliation between the ledger and the cache store.
pub struct ReconcileEngine {
    store: Arc<dyn CacheStore>,
    ledger: Arc<dyn LedgerSource>,
    config: SyncConfig,
}

impl ReconcileEngine {
    pub fn new(
        store: Arc<dyn CacheStore>,
        ledger: Arc<dyn LedgerSource>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Run a full reconciliation.
    ///
    /// Mutual exclusion is a compare-and-swap on the persisted sync flag;
    /// a concurrent trigger gets [`SyncError::AlreadyRunning`]. Any
    /// failure after the flag is claimed resets it to idle without
    /// recording a success timestamp, then propagates.
    pub async fn full_sync(&self) -> SyncResult<SyncReport> {
        if !self.store.try_begin_sync().await? {
            debug!("Full sync requested while another run holds the flag");
            return Err(SyncError::AlreadyRunning);
        }

        let started_at = Utc::now();
        info!("Full sync started");

        match self.run_to_completion(started_at).await {
            Ok(report) => {
                info!(
                    organizations = report.organizations,
                    documents = report.documents,
                    rejected = report.rejected_documents,
                    deleted = report.deleted,
                    chunk_errors = report.chunk_errors,
                    "Full sync finished"
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(reset_err) = self.store.reset_sync_status().await {
                    error!(error = %reset_err, "Failed to reset sync flag after failed run");
                }
                Err(e)
            }
        }
    }

    async fn run_to_completion(&self, started_at: DateTime<Utc>) -> SyncResult<SyncReport> {
        // Cache snapshots are best effort; an unreadable cache degrades
        // merge and stale detection to the empty-cache path.
        let cached_orgs = self.store.list_organizations().await.unwrap_or_else(|e| {
            warn!(error = %e, "Organization snapshot failed, treating cache as empty");
            Vec::new()
        });
        let cached_docs = self.store.list_documents().await.unwrap_or_else(|e| {
            warn!(error = %e, "Document snapshot failed, treating cache as empty");
            Vec::new()
        });

        let org_atts = self
            .ledger
            .query_by_schema(&self.config.organization_schema, self.config.page_limit)
            .await?;
        let doc_atts = self
            .ledger
            .query_by_schema(&self.config.document_schema, self.config.page_limit)
            .await?;
        debug!(
            organizations = org_atts.len(),
            documents = doc_atts.len(),
            "Fetched attestations"
        );

        let cached_orgs_by_id: HashMap<AttestationId, OrganizationRecord> = cached_orgs
            .into_iter()
            .map(|o| (o.attestation_id.clone(), o))
            .collect();
        let cached_docs_by_id: HashMap<AttestationId, DocumentRecord> = cached_docs
            .into_iter()
            .map(|d| (d.attestation_id.clone(), d))
            .collect();

        let orgs = self.stage_organizations(&org_atts, &cached_orgs_by_id);
        let org_admins: HashMap<AttestationId, Address> = orgs
            .iter()
            .map(|o| (o.attestation_id.clone(), o.admin_address.clone()))
            .collect();

        let (mut docs, rejected_documents) = self.stage_documents(&doc_atts, &org_admins);

        VersionResolver::new(self.store.as_ref())
            .resolve_batch(&mut docs)
            .await;

        let docs: Vec<DocumentRecord> = docs
            .into_iter()
            .map(|d| match cached_docs_by_id.get(&d.attestation_id) {
                Some(existing) => d.merged_with(existing),
                None => d,
            })
            .collect();

        let mut chunk_errors = 0u64;
        let mut orgs_written = 0u64;
        for chunk in orgs.chunks(self.config.batch_chunk) {
            match self.store.put_organizations(chunk).await {
                Ok(()) => orgs_written += chunk.len() as u64,
                Err(e) => {
                    error!(size = chunk.len(), error = %e, "Organization batch write failed");
                    chunk_errors += 1;
                }
            }
        }
        let mut docs_written = 0u64;
        for chunk in docs.chunks(self.config.batch_chunk) {
            match self.store.put_documents(chunk).await {
                Ok(()) => docs_written += chunk.len() as u64,
                Err(e) => {
                    error!(size = chunk.len(), error = %e, "Document batch write failed");
                    chunk_errors += 1;
                }
            }
        }

        // A document cached before the run but absent from this run's
        // accepted set no longer has a valid, authorized attestation.
        let accepted: HashSet<&AttestationId> = docs.iter().map(|d| &d.attestation_id).collect();
        let stale: Vec<AttestationId> = cached_docs_by_id
            .keys()
            .filter(|id| !accepted.contains(id))
            .cloned()
            .collect();
        let mut deleted = 0u64;
        for chunk in stale.chunks(self.config.batch_chunk) {
            match self.store.delete_documents(chunk).await {
                Ok(()) => deleted += chunk.len() as u64,
                Err(e) => {
                    error!(size = chunk.len(), error = %e, "Stale document delete failed");
                    chunk_errors += 1;
                }
            }
        }

        let finished_at = Utc::now();
        let counts = SyncCounts {
            organizations: orgs_written,
            documents: docs_written,
            deleted,
        };
        self.store.finish_sync(counts, finished_at).await?;

        Ok(SyncReport {
            organizations: orgs_written,
            documents: docs_written,
            rejected_documents,
            deleted,
            chunk_errors,
            started_at,
            finished_at,
        })
    }

    fn stage_organizations(
        &self,
        atts: &[Attestation],
        cached: &HashMap<AttestationId, OrganizationRecord>,
    ) -> Vec<OrganizationRecord> {
        let mut out = Vec::with_capacity(atts.len());
        for att in atts {
            match decode_organization(att) {
                Ok(rec) => {
                    let rec = match cached.get(&rec.attestation_id) {
                        Some(existing) => rec.merged_with(existing),
                        None => rec,
                    };
                    out.push(rec);
                }
                Err(e) => {
                    warn!(attestation_id = %att.id, error = %e, "Skipping undecodable organization record");
                }
            }
        }
        out
    }

    fn stage_documents(
        &self,
        atts: &[Attestation],
        org_admins: &HashMap<AttestationId, Address>,
    ) -> (Vec<DocumentRecord>, u64) {
        let mut out = Vec::with_capacity(atts.len());
        let mut rejected = 0u64;
        for att in atts {
            let rec = match decode_document(att) {
                Ok(rec) => rec,
                Err(e) => {
                    warn!(attestation_id = %att.id, error = %e, "Skipping undecodable document record");
                    continue;
                }
            };
            match org_admins.get(&rec.organization_id) {
                Some(admin) if admin.matches(rec.attester.as_str()) => out.push(rec),
                Some(_) => {
                    rejected += 1;
                    warn!(
                        attestation_id = %att.id,
                        organization_id = %rec.organization_id,
                        attester = %rec.attester,
                        "Rejected document: attester is not the organization admin"
                    );
                }
                None => {
                    rejected += 1;
                    warn!(
                        attestation_id = %att.id,
                        organization_id = %rec.organization_id,
                        "Rejected document: unknown owning organization"
                    );
                }
            }
        }
        (out, rejected)
    }

    /// Sync a single attestation by id.
    ///
    /// Idempotent; repeated calls converge on the same cache state.
    /// Document authorization is checked against the cached owning
    /// organization, so a document synced before its organization is
    /// rejected until a run that sees both.
    pub async fn sync_one(&self, id: &AttestationId) -> SyncResult<SyncOutcome> {
        let att = match self.ledger.query_by_id(id).await? {
            Some(att) => att,
            None => {
                debug!(attestation_id = %id, "Attestation not found on ledger");
                return Ok(SyncOutcome::NotFound);
            }
        };

        if att.has_schema(&self.config.organization_schema) {
            let rec = match decode_organization(&att) {
                Ok(rec) => rec,
                Err(e) => {
                    warn!(attestation_id = %id, error = %e, "Undecodable organization record");
                    return Ok(SyncOutcome::Skipped);
                }
            };
            let rec = match self.store.get_organization(id).await? {
                Some(existing) => rec.merged_with(&existing),
                None => rec,
            };
            self.store.put_organization(&rec).await?;
            info!(attestation_id = %id, name = %rec.name, "Organization synced");
            Ok(SyncOutcome::Organization)
        } else if att.has_schema(&self.config.document_schema) {
            let mut rec = match decode_document(&att) {
                Ok(rec) => rec,
                Err(e) => {
                    warn!(attestation_id = %id, error = %e, "Undecodable document record");
                    return Ok(SyncOutcome::Skipped);
                }
            };
            let authorized = self
                .store
                .get_organization(&rec.organization_id)
                .await?
                .map(|org| org.admin_address.matches(rec.attester.as_str()))
                .unwrap_or(false);
            if !authorized {
                warn!(
                    attestation_id = %id,
                    organization_id = %rec.organization_id,
                    "Rejected document: no cached organization admits this attester"
                );
                return Ok(SyncOutcome::Rejected);
            }
            rec.version =
                resolve_version_single(&rec, self.store.as_ref(), self.ledger.as_ref()).await;
            let rec = match self.store.get_document(id).await? {
                Some(existing) => rec.merged_with(&existing),
                None => rec,
            };
            self.store.put_document(&rec).await?;
            info!(attestation_id = %id, version = rec.version, "Document synced");
            Ok(SyncOutcome::Document)
        } else {
            debug!(attestation_id = %id, schema_id = %att.schema_id, "Unrecognised schema, skipping");
            Ok(SyncOutcome::Skipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::{DocumentStatus, OrganizationStatus, SchemaId, SyncStatus};
    use docket_ledger::MockLedger;
    use docket_store::MemoryStore;
    use serde_json::{json, Value};

    fn fields(pairs: &[(&str, Value)]) -> String {
        let list: Vec<Value> = pairs
            .iter()
            .map(|(name, value)| json!({ "name": name, "type": "string", "value": value }))
            .collect();
        Value::Array(list).to_string()
    }

    fn id(byte: &str) -> AttestationId {
        AttestationId::parse(&byte.repeat(32)).unwrap()
    }

    fn addr(byte: &str) -> Address {
        Address::parse(&format!("0x{}", byte.repeat(20))).unwrap()
    }

    fn attestation(
        id_byte: &str,
        author: &Address,
        schema: &SchemaId,
        decoded: String,
        time: i64,
    ) -> Attestation {
        Attestation {
            id: id(id_byte),
            author: author.clone(),
            recipient: None,
            time,
            revocable: true,
            revoked: false,
            schema_id: schema.clone(),
            data: "0x".to_string(),
            decoded_data_json: decoded,
        }
    }

    fn org_attestation(id_byte: &str, author: &Address, config: &SyncConfig) -> Attestation {
        attestation(
            id_byte,
            author,
            &config.organization_schema,
            fields(&[("name", json!("Acme")), ("description", json!("ledger-sourced"))]),
            1_700_000_000,
        )
    }

    fn doc_attestation(
        id_byte: &str,
        author: &Address,
        org_id_byte: &str,
        prev: Option<&str>,
        config: &SyncConfig,
    ) -> Attestation {
        let previous = prev.map(|p| id(p).as_str().to_string()).unwrap_or_default();
        let pairs = vec![
            ("title", json!("Charter")),
            ("organizationId", json!(id(org_id_byte).as_str())),
            ("previousVersionId", json!(previous)),
        ];
        attestation(
            id_byte,
            author,
            &config.document_schema,
            fields(&pairs),
            1_700_000_100,
        )
    }

    fn engine(store: Arc<MemoryStore>, ledger: Arc<MockLedger>) -> ReconcileEngine {
        ReconcileEngine::new(store, ledger, SyncConfig::default())
    }

    #[tokio::test]
    async fn test_full_sync_accepts_authorized_chain() {
        let config = SyncConfig::default();
        let admin = addr("aa");
        let stranger = addr("bb");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());

        ledger.add(org_attestation("01", &admin, &config)).await;
        ledger
            .add(doc_attestation("11", &admin, "01", None, &config))
            .await;
        ledger
            .add(doc_attestation("22", &admin, "01", Some("11"), &config))
            .await;
        ledger
            .add(doc_attestation("33", &stranger, "01", Some("22"), &config))
            .await;

        let engine = engine(store.clone(), ledger);
        let report = engine.full_sync().await.unwrap();

        assert_eq!(report.organizations, 1);
        assert_eq!(report.documents, 2);
        assert_eq!(report.rejected_documents, 1);
        assert_eq!(report.chunk_errors, 0);

        let d1 = store.get_document(&id("11")).await.unwrap().unwrap();
        let d2 = store.get_document(&id("22")).await.unwrap().unwrap();
        assert_eq!(d1.version, 1);
        assert_eq!(d2.version, 2);
        assert!(store.get_document(&id("33")).await.unwrap().is_none());

        let meta = store.get_sync_meta().await.unwrap();
        assert_eq!(meta.status, SyncStatus::Idle);
        assert!(meta.last_sync_at.is_some());
        assert_eq!(meta.last_counts.documents, 2);
    }

    #[tokio::test]
    async fn test_full_sync_is_idempotent_and_preserves_edits() {
        let config = SyncConfig::default();
        let admin = addr("aa");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());
        ledger.add(org_attestation("01", &admin, &config)).await;
        ledger
            .add(doc_attestation("11", &admin, "01", None, &config))
            .await;

        let engine = engine(store.clone(), ledger);
        engine.full_sync().await.unwrap();

        // Operator edits survive later runs.
        let mut org = store.get_organization(&id("01")).await.unwrap().unwrap();
        org.description = "hand-curated".to_string();
        store.put_organization(&org).await.unwrap();
        let mut doc = store.get_document(&id("11")).await.unwrap().unwrap();
        doc.title = "Charter (amended)".to_string();
        store.put_document(&doc).await.unwrap();

        let report = engine.full_sync().await.unwrap();
        assert_eq!(report.deleted, 0);

        let org = store.get_organization(&id("01")).await.unwrap().unwrap();
        assert_eq!(org.description, "hand-curated");
        let doc = store.get_document(&id("11")).await.unwrap().unwrap();
        assert_eq!(doc.title, "Charter (amended)");
        assert_eq!(doc.version, 1);
    }

    #[tokio::test]
    async fn test_full_sync_deletes_stale_documents() {
        let config = SyncConfig::default();
        let admin = addr("aa");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());
        ledger.add(org_attestation("01", &admin, &config)).await;

        // Cached document with no surviving attestation.
        let att = doc_attestation("77", &admin, "01", None, &config);
        let mut orphan = decode_document(&att).unwrap();
        orphan.version = 1;
        store.put_document(&orphan).await.unwrap();

        let engine = engine(store.clone(), ledger);
        let report = engine.full_sync().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.get_document(&id("77")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_sync_pages_through_large_record_sets() {
        let config = SyncConfig {
            page_limit: 2,
            ..SyncConfig::default()
        };
        let admin = addr("aa");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());
        ledger.add(org_attestation("01", &admin, &config)).await;
        for (byte, time) in [("11", 100), ("22", 200), ("33", 300)] {
            let mut doc = doc_attestation(byte, &admin, "01", None, &config);
            doc.time = 1_700_000_000 + time;
            ledger.add(doc).await;
        }

        // Seed the cache, then re-run with the same two-record page
        // bound: records past the first page must survive the run
        // instead of being swept as stale.
        let engine = ReconcileEngine::new(store.clone(), ledger, config);
        engine.full_sync().await.unwrap();
        let report = engine.full_sync().await.unwrap();

        assert_eq!(report.organizations, 1);
        assert_eq!(report.documents, 3);
        assert_eq!(report.deleted, 0);
        for byte in ["11", "22", "33"] {
            assert!(store.get_document(&id(byte)).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_full_sync_flags_concurrent_run() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());
        store.try_begin_sync().await.unwrap();

        let engine = engine(store.clone(), ledger);
        match engine.full_sync().await {
            Err(SyncError::AlreadyRunning) => {}
            other => panic!("expected AlreadyRunning, got {:?}", other.map(|r| r.documents)),
        }
    }

    #[tokio::test]
    async fn test_full_sync_resets_flag_on_ledger_failure() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());
        ledger.set_fail(true);

        let engine = engine(store.clone(), ledger);
        assert!(matches!(
            engine.full_sync().await,
            Err(SyncError::Ledger(_))
        ));

        let meta = store.get_sync_meta().await.unwrap();
        assert_eq!(meta.status, SyncStatus::Idle);
        assert!(meta.last_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_revoked_records_propagate() {
        let config = SyncConfig::default();
        let admin = addr("aa");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());

        let mut org = org_attestation("01", &admin, &config);
        org.revoked = true;
        ledger.add(org).await;
        let mut doc = doc_attestation("11", &admin, "01", None, &config);
        doc.revoked = true;
        ledger.add(doc).await;

        let engine = engine(store.clone(), ledger);
        engine.full_sync().await.unwrap();

        let org = store.get_organization(&id("01")).await.unwrap().unwrap();
        assert_eq!(org.status, OrganizationStatus::Inactive);
        let doc = store.get_document(&id("11")).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Revoked);
    }

    #[tokio::test]
    async fn test_sync_one_dispatches_by_schema() {
        let config = SyncConfig::default();
        let admin = addr("aa");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());
        ledger.add(org_attestation("01", &admin, &config)).await;
        ledger
            .add(doc_attestation("11", &admin, "01", None, &config))
            .await;

        let engine = engine(store.clone(), ledger);

        // Document before its organization: authorization cannot be
        // established from the cache.
        assert_eq!(
            engine.sync_one(&id("11")).await.unwrap(),
            SyncOutcome::Rejected
        );

        assert_eq!(
            engine.sync_one(&id("01")).await.unwrap(),
            SyncOutcome::Organization
        );
        assert_eq!(
            engine.sync_one(&id("11")).await.unwrap(),
            SyncOutcome::Document
        );
        let doc = store.get_document(&id("11")).await.unwrap().unwrap();
        assert_eq!(doc.version, 1);

        assert_eq!(
            engine.sync_one(&id("99")).await.unwrap(),
            SyncOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_sync_one_walks_version_chain() {
        let config = SyncConfig::default();
        let admin = addr("aa");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MockLedger::new());
        ledger.add(org_attestation("01", &admin, &config)).await;
        ledger
            .add(doc_attestation("11", &admin, "01", None, &config))
            .await;
        ledger
            .add(doc_attestation("22", &admin, "01", Some("11"), &config))
            .await;

        let engine = engine(store.clone(), ledger);
        engine.sync_one(&id("01")).await.unwrap();

        // Predecessor not cached: the walk follows the ledger.
        assert_eq!(
            engine.sync_one(&id("22")).await.unwrap(),
            SyncOutcome::Document
        );
        let doc = store.get_document(&id("22")).await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
    }
}
