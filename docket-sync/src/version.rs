//! Version chain resolution
//!
//! Document versions are not stored on the ledger; they are derived from
//! the `previous_version_id` chain. A document with no previous pointer is
//! version 1, otherwise it is its predecessor's version plus one. Broken
//! chains degrade to version 1 rather than failing the run, and walks are
//! bounded so cycles and runaway chains truncate instead of hanging.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use docket_core::constants::MAX_CHAIN_DEPTH;
use docket_core::{decode_document, AttestationId, DocumentRecord};
use docket_ledger::LedgerSource;
use docket_store::CacheStore;

/// Batch resolver used during a full reconciliation run.
///
/// Predecessors are looked up in the in-flight batch first, then in the
/// cache. Results are memoised so shared chain tails are walked once.
pub struct VersionResolver<'a> {
    store: &'a dyn CacheStore,
    memo: HashMap<AttestationId, u32>,
}

impl<'a> VersionResolver<'a> {
    pub fn new(store: &'a dyn CacheStore) -> Self {
        Self {
            store,
            memo: HashMap::new(),
        }
    }

    /// Assign a version to every document in the batch.
    pub async fn resolve_batch(&mut self, docs: &mut [DocumentRecord]) {
        let prev_map: HashMap<AttestationId, Option<AttestationId>> = docs
            .iter()
            .map(|d| (d.attestation_id.clone(), d.previous_version_id.clone()))
            .collect();

        // Two documents claiming the same predecessor is a fork; both
        // resolve to predecessor + 1.
        let mut claimed: HashSet<&AttestationId> = HashSet::new();
        for doc in docs.iter() {
            if let Some(prev) = &doc.previous_version_id {
                if !claimed.insert(prev) {
                    warn!(
                        previous = %prev,
                        document = %doc.attestation_id,
                        "Forked version chain: predecessor claimed by multiple documents"
                    );
                }
            }
        }

        for doc in docs.iter_mut() {
            doc.version = self.resolve_chain(&doc.attestation_id, &prev_map).await;
        }
    }

    async fn resolve_chain(
        &mut self,
        start: &AttestationId,
        prev_map: &HashMap<AttestationId, Option<AttestationId>>,
    ) -> u32 {
        if let Some(v) = self.memo.get(start) {
            return *v;
        }

        let mut path: Vec<AttestationId> = Vec::new();
        let mut current = start.clone();

        // Walk predecessors until we hit something with a known version:
        // a memoised batch entry, a cached document, or a chain root.
        // `base` is that known version (0 for a root, so the deepest
        // unwound entry becomes 1).
        let base: u32 = loop {
            if let Some(v) = self.memo.get(&current) {
                break *v;
            }
            if path.contains(&current) {
                warn!(document = %current, "Cycle in version chain, truncating walk");
                break 0;
            }
            if path.len() as u32 >= MAX_CHAIN_DEPTH {
                warn!(
                    document = %start,
                    depth = MAX_CHAIN_DEPTH,
                    "Version chain exceeds depth bound, truncating walk"
                );
                break 0;
            }
            path.push(current.clone());

            match prev_map.get(&current) {
                Some(Some(prev)) => {
                    if prev_map.contains_key(prev) || self.memo.contains_key(prev) {
                        current = prev.clone();
                        continue;
                    }
                    match self.store.get_document(prev).await {
                        Ok(Some(cached)) => break cached.version,
                        Ok(None) => {
                            debug!(
                                document = %current,
                                previous = %prev,
                                "Broken version chain, predecessor unknown"
                            );
                            break 0;
                        }
                        Err(e) => {
                            warn!(
                                previous = %prev,
                                error = %e,
                                "Cache lookup failed during version resolution"
                            );
                            break 0;
                        }
                    }
                }
                // No previous pointer: chain root.
                Some(None) | None => break 0,
            }
        };

        let mut version = base;
        while let Some(id) = path.pop() {
            version += 1;
            self.memo.insert(id, version);
        }
        self.memo.get(start).copied().unwrap_or(1)
    }
}

/// Resolve a single document's version outside a batch run.
///
/// Predecessors are read from the cache when present (their version is
/// already resolved), otherwise fetched from the ledger and followed.
/// The walk is bounded by [`MAX_CHAIN_DEPTH`] hops.
pub async fn resolve_version_single(
    doc: &DocumentRecord,
    store: &dyn CacheStore,
    ledger: &dyn LedgerSource,
) -> u32 {
    let mut hops: u32 = 0;
    let mut seen: HashSet<AttestationId> = HashSet::new();
    seen.insert(doc.attestation_id.clone());
    let mut prev = doc.previous_version_id.clone();

    while let Some(id) = prev {
        if hops >= MAX_CHAIN_DEPTH || !seen.insert(id.clone()) {
            warn!(
                document = %doc.attestation_id,
                "Version walk truncated (depth bound or cycle)"
            );
            return hops.max(1);
        }
        hops += 1;

        match store.get_document(&id).await {
            Ok(Some(cached)) => return cached.version + hops,
            Ok(None) => {}
            Err(e) => {
                warn!(previous = %id, error = %e, "Cache lookup failed during version walk");
            }
        }

        match ledger.query_by_id(&id).await {
            Ok(Some(att)) => match decode_document(&att) {
                Ok(prev_doc) => prev = prev_doc.previous_version_id,
                Err(e) => {
                    debug!(previous = %id, error = %e, "Undecodable predecessor, chain degrades");
                    return hops;
                }
            },
            Ok(None) => {
                debug!(previous = %id, "Unknown predecessor, chain degrades");
                return hops;
            }
            Err(e) => {
                warn!(previous = %id, error = %e, "Ledger lookup failed during version walk");
                return hops;
            }
        }
    }

    hops + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docket_core::{Address, DocumentGeneration, DocumentStatus};
    use docket_store::MemoryStore;

    fn id(byte: &str) -> AttestationId {
        AttestationId::parse(&byte.repeat(32)).unwrap()
    }

    fn doc(id_byte: &str, prev: Option<&str>) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            attestation_id: id(id_byte),
            title: "t".to_string(),
            document_type: String::new(),
            content_hash: String::new(),
            content_ref: String::new(),
            version: 0,
            previous_version_id: prev.map(id),
            status: DocumentStatus::Active,
            attester: Address::parse(&format!("0x{}", "aa".repeat(20))).unwrap(),
            organization_id: id("99"),
            voting_tx_hash: None,
            schema_version: DocumentGeneration::V3Current,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_batch_chain_in_order() {
        let store = MemoryStore::new();
        let mut docs = vec![doc("11", None), doc("22", Some("11")), doc("33", Some("22"))];
        VersionResolver::new(&store).resolve_batch(&mut docs).await;
        assert_eq!(docs[0].version, 1);
        assert_eq!(docs[1].version, 2);
        assert_eq!(docs[2].version, 3);
    }

    #[tokio::test]
    async fn test_batch_chain_out_of_order() {
        let store = MemoryStore::new();
        let mut docs = vec![doc("33", Some("22")), doc("11", None), doc("22", Some("11"))];
        VersionResolver::new(&store).resolve_batch(&mut docs).await;
        let by_id: HashMap<_, _> = docs.iter().map(|d| (d.attestation_id.clone(), d.version)).collect();
        assert_eq!(by_id[&id("11")], 1);
        assert_eq!(by_id[&id("22")], 2);
        assert_eq!(by_id[&id("33")], 3);
    }

    #[tokio::test]
    async fn test_broken_chain_degrades_to_one() {
        let store = MemoryStore::new();
        let mut docs = vec![doc("22", Some("11"))];
        VersionResolver::new(&store).resolve_batch(&mut docs).await;
        assert_eq!(docs[0].version, 1);
    }

    #[tokio::test]
    async fn test_cache_fallback() {
        let store = MemoryStore::new();
        let mut cached = doc("11", None);
        cached.version = 4;
        store.put_document(&cached).await.unwrap();

        let mut docs = vec![doc("22", Some("11"))];
        VersionResolver::new(&store).resolve_batch(&mut docs).await;
        assert_eq!(docs[0].version, 5);
    }

    #[tokio::test]
    async fn test_fork_assigns_same_version() {
        let store = MemoryStore::new();
        let mut docs = vec![
            doc("11", None),
            doc("22", Some("11")),
            doc("33", Some("11")),
        ];
        VersionResolver::new(&store).resolve_batch(&mut docs).await;
        assert_eq!(docs[1].version, 2);
        assert_eq!(docs[2].version, 2);
    }

    #[tokio::test]
    async fn test_cycle_truncates() {
        let store = MemoryStore::new();
        let mut docs = vec![doc("11", Some("22")), doc("22", Some("11"))];
        VersionResolver::new(&store).resolve_batch(&mut docs).await;
        // Cycles cannot hang the run; every member still gets a version.
        assert!(docs.iter().all(|d| d.version >= 1));
    }
}
