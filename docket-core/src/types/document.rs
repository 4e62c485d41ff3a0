//! Document cache entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Address, AttestationId};

/// Document status in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Active,
    Revoked,
}

/// Which historical payload layout a document record was decoded from.
///
/// The ledger carries no in-band layout version; generations are
/// detected structurally by the codec's ordered matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentGeneration {
    /// Oldest layout: voting transaction field, no version field
    V1Legacy,
    /// Middle layout: both voting transaction and inline version
    V2Transitional,
    /// Current layout: previous-version pointer, version is computed
    V3Current,
}

/// Derived cache entry for a registered document, keyed by attestation id.
///
/// Forms a singly-linked version chain through `previous_version_id`;
/// `version` is computed from chain depth at sync time, never stored on
/// the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Attestation id (primary key)
    pub attestation_id: AttestationId,
    pub title: String,
    pub document_type: String,
    /// Content hash of the registered blob
    pub content_hash: String,
    /// Opaque content-store locator
    pub content_ref: String,
    /// Sequential version, >= 1 once resolved
    pub version: u32,
    /// Back-reference to the previous version, if any
    pub previous_version_id: Option<AttestationId>,
    pub status: DocumentStatus,
    /// Author of the attestation; must equal the owning organization's
    /// admin address or the record is rejected at sync time
    pub attester: Address,
    /// Owning organization attestation id
    pub organization_id: AttestationId,
    /// Optional voting transaction metadata
    pub voting_tx_hash: Option<String>,
    /// Generation tag assigned by the codec
    pub schema_version: DocumentGeneration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Merge a freshly decoded ledger record with its cache counterpart.
    ///
    /// Only the user-editable title survives from the cache; every other
    /// field is ledger-authoritative.
    pub fn merged_with(mut self, existing: &DocumentRecord) -> DocumentRecord {
        if !existing.title.is_empty() {
            self.title = existing.title.clone();
        }
        self.created_at = existing.created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_title_only() {
        let id = AttestationId::parse(&"33".repeat(32)).unwrap();
        let org = AttestationId::parse(&"44".repeat(32)).unwrap();
        let attester = Address::parse(&format!("0x{}", "cc".repeat(20))).unwrap();
        let now = Utc::now();

        let fresh = DocumentRecord {
            attestation_id: id.clone(),
            title: "Ledger title".to_string(),
            document_type: "contract".to_string(),
            content_hash: "deadbeef".to_string(),
            content_ref: "store://a".to_string(),
            version: 2,
            previous_version_id: None,
            status: DocumentStatus::Active,
            attester: attester.clone(),
            organization_id: org.clone(),
            voting_tx_hash: None,
            schema_version: DocumentGeneration::V3Current,
            created_at: now,
            updated_at: now,
        };
        let cached = DocumentRecord {
            title: "Renamed by a user".to_string(),
            content_hash: "stale".to_string(),
            ..fresh.clone()
        };

        let merged = fresh.merged_with(&cached);
        assert_eq!(merged.title, "Renamed by a user");
        assert_eq!(merged.content_hash, "deadbeef");
    }
}
