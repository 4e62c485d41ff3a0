//! Sync engine configuration

use std::env;

use docket_core::constants::{
    DOCUMENT_SCHEMA_ID, FULL_SYNC_PAGE_LIMIT, MAX_BATCH_WRITE, MAX_RESYNC_ATTEMPTS,
    ORGANIZATION_SCHEMA_ID, RESYNC_DELAY_SECS, SYNC_INTERVAL_SECS,
};
use docket_core::SchemaId;

/// Reconciliation engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Schema tag for organization attestations
    pub organization_schema: SchemaId,
    /// Schema tag for document attestations
    pub document_schema: SchemaId,
    /// Records fetched per ledger request during a full run
    pub page_limit: u32,
    /// Records per batch write during the commit phase
    pub batch_chunk: usize,
    /// Seconds between lazily triggered full runs
    pub sync_interval_secs: u64,
    /// Delay for the follow-up resync task after a write
    pub resync_delay_secs: u64,
    /// Resync worker poll interval in seconds
    pub resync_poll_secs: u64,
    /// Failed resync tasks are dropped after this many attempts
    pub max_resync_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            organization_schema: SchemaId::parse(ORGANIZATION_SCHEMA_ID)
                .expect("built-in organization schema tag is valid hex"),
            document_schema: SchemaId::parse(DOCUMENT_SCHEMA_ID)
                .expect("built-in document schema tag is valid hex"),
            page_limit: FULL_SYNC_PAGE_LIMIT,
            batch_chunk: MAX_BATCH_WRITE,
            sync_interval_secs: SYNC_INTERVAL_SECS,
            resync_delay_secs: RESYNC_DELAY_SECS,
            resync_poll_secs: 2,
            max_resync_attempts: MAX_RESYNC_ATTEMPTS,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - DOCKET_ORG_SCHEMA_ID: organization schema tag
    /// - DOCKET_DOC_SCHEMA_ID: document schema tag
    /// - DOCKET_SYNC_PAGE_LIMIT: fetch page size
    /// - DOCKET_SYNC_INTERVAL_SECS: lazy full-sync interval
    /// - DOCKET_RESYNC_DELAY_SECS: follow-up resync delay
    /// - DOCKET_RESYNC_POLL_SECS: resync worker poll interval
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            organization_schema: env::var("DOCKET_ORG_SCHEMA_ID")
                .ok()
                .and_then(|s| SchemaId::parse(&s))
                .unwrap_or(defaults.organization_schema),
            document_schema: env::var("DOCKET_DOC_SCHEMA_ID")
                .ok()
                .and_then(|s| SchemaId::parse(&s))
                .unwrap_or(defaults.document_schema),
            page_limit: env::var("DOCKET_SYNC_PAGE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.page_limit),
            batch_chunk: defaults.batch_chunk,
            sync_interval_secs: env::var("DOCKET_SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sync_interval_secs),
            resync_delay_secs: env::var("DOCKET_RESYNC_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.resync_delay_secs),
            resync_poll_secs: env::var("DOCKET_RESYNC_POLL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.resync_poll_secs),
            max_resync_attempts: defaults.max_resync_attempts,
        }
    }
}
