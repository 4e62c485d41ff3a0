//! HTTP handlers

pub mod documents;
pub mod health;
pub mod organizations;
pub mod sync;

pub use documents::{get_document, list_documents};
pub use health::health_check;
pub use organizations::{get_organization, list_organization_documents, list_organizations};
pub use sync::{sync_record, sync_status, trigger_sync};
