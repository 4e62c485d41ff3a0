//! Organization cache entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Address, AttestationId};

/// Organization status in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationStatus {
    Active,
    Inactive,
    Pending,
}

/// Derived cache entry for an organization, keyed by attestation id.
///
/// Created and refreshed only by the reconciliation engine. Descriptive
/// fields are user-editable and survive re-syncs; `admin_address` and
/// revocation-derived status are always ledger-authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRecord {
    /// Attestation id (primary key)
    pub attestation_id: AttestationId,
    pub name: String,
    pub description: String,
    pub location: String,
    pub member_count: u64,
    pub size_class: String,
    pub status: OrganizationStatus,
    pub contact_email: String,
    pub contact_phone: String,
    pub logo_url: String,
    pub website_url: String,
    /// Derived from the attestation author; ledger-authoritative
    pub admin_address: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationRecord {
    /// Merge a freshly decoded ledger record with its existing cache
    /// counterpart.
    ///
    /// User-edited descriptive fields take precedence when non-empty in
    /// the cache; the ledger fills gaps. Admin address and
    /// revocation-derived status always come from the ledger side
    /// (`self`), which the caller has already forced to `Inactive` when
    /// the attestation is revoked.
    pub fn merged_with(mut self, existing: &OrganizationRecord) -> OrganizationRecord {
        fn keep(cached: &str, fresh: String) -> String {
            if cached.is_empty() {
                fresh
            } else {
                cached.to_string()
            }
        }

        self.name = keep(&existing.name, self.name);
        self.description = keep(&existing.description, self.description);
        self.location = keep(&existing.location, self.location);
        self.contact_email = keep(&existing.contact_email, self.contact_email);
        self.contact_phone = keep(&existing.contact_phone, self.contact_phone);
        self.logo_url = keep(&existing.logo_url, self.logo_url);
        self.website_url = keep(&existing.website_url, self.website_url);
        if existing.member_count != 0 {
            self.member_count = existing.member_count;
        }
        self.size_class = keep(&existing.size_class, self.size_class);

        // A non-revoked re-sync keeps whatever status the cache holds;
        // a revoked one has already forced Inactive on the ledger side.
        if self.status != OrganizationStatus::Inactive {
            self.status = existing.status;
        }

        self.created_at = existing.created_at;
        self
    }
}
