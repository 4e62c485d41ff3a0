//! API response and request bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docket_core::{
    DocumentGeneration, DocumentRecord, DocumentStatus, OrganizationRecord, OrganizationStatus,
    SyncCounts, SyncMeta, SyncStatus,
};
use docket_sync::{SyncOutcome, SyncReport};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Listing envelope
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub id: String,
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
    pub admin_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrganizationRecord> for OrganizationResponse {
    fn from(r: OrganizationRecord) -> Self {
        Self {
            id: r.attestation_id.as_str().to_string(),
            name: r.name,
            description: r.description,
            location: r.location,
            member_count: r.member_count,
            size_class: r.size_class,
            status: r.status,
            contact_email: r.contact_email,
            contact_phone: r.contact_phone,
            logo_url: r.logo_url,
            website_url: r.website_url,
            admin_address: r.admin_address.as_str().to_string(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub document_type: String,
    pub content_hash: String,
    pub content_ref: String,
    pub version: u32,
    pub previous_version_id: Option<String>,
    pub status: DocumentStatus,
    pub attester: String,
    pub organization_id: String,
    pub voting_tx_hash: Option<String>,
    pub schema_version: DocumentGeneration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(r: DocumentRecord) -> Self {
        Self {
            id: r.attestation_id.as_str().to_string(),
            title: r.title,
            document_type: r.document_type,
            content_hash: r.content_hash,
            content_ref: r.content_ref,
            version: r.version,
            previous_version_id: r.previous_version_id.map(|p| p.as_str().to_string()),
            status: r.status,
            attester: r.attester.as_str().to_string(),
            organization_id: r.organization_id.as_str().to_string(),
            voting_tx_hash: r.voting_tx_hash,
            schema_version: r.schema_version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_counts: SyncCounts,
}

impl From<SyncMeta> for SyncStatusResponse {
    fn from(m: SyncMeta) -> Self {
        Self {
            status: m.status,
            last_sync_at: m.last_sync_at,
            last_counts: m.last_counts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerSyncResponse {
    /// False when a run was already in progress
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

#[derive(Debug, Deserialize)]
pub struct SyncRecordRequest {
    pub attestation_id: String,
}

#[derive(Debug, Serialize)]
pub struct SyncRecordResponse {
    pub attestation_id: String,
    pub outcome: SyncOutcome,
}
