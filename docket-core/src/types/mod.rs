//! Domain types for the Docket registry.

pub mod attestation;
pub mod common;
pub mod document;
pub mod organization;
pub mod sync;

pub use attestation::Attestation;
pub use common::{normalize_ref, Address, AttestationId, SchemaId};
pub use document::{DocumentGeneration, DocumentRecord, DocumentStatus};
pub use organization::{OrganizationRecord, OrganizationStatus};
pub use sync::{ResyncTask, SyncCounts, SyncMeta, SyncStatus};
