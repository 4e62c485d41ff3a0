//! Protocol constants for the Docket registry.
//!
//! Defaults here can be overridden through the `DOCKET_*` environment
//! variables consumed by the per-crate config structs.

/// Zero-value attestation id sentinel ("no previous version").
pub const ZERO_ID: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Zero-value address sentinel (unused recipient).
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Replay window for write-path authentication (5 minutes, in millis).
pub const AUTH_REPLAY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Maximum hops when reconstructing a version chain on demand.
pub const MAX_CHAIN_DEPTH: u32 = 20;

/// Maximum records per batch commit, matching the store's per-batch limit.
pub const MAX_BATCH_WRITE: usize = 400;

/// Page size for full-sync ledger queries.
pub const FULL_SYNC_PAGE_LIMIT: u32 = 500;

/// Interval between scheduled full syncs (1 hour).
pub const SYNC_INTERVAL_SECS: u64 = 3600;

/// Delay before the post-revoke catch-up resync, absorbing index lag.
pub const RESYNC_DELAY_SECS: u64 = 8;

/// Maximum delivery attempts for a queued resync task.
pub const MAX_RESYNC_ATTEMPTS: u32 = 3;

/// Retry bound for ledger queries (retries, not total attempts).
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff between query retries.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Current-generation organization schema id.
pub const ORGANIZATION_SCHEMA_ID: &str =
    "0x7a1d4f9c02b35e6688d1c30a8f44e71b5c29d8460d3aa1e5b8f0723c619e4d2a";

/// Current-generation document schema id.
pub const DOCUMENT_SCHEMA_ID: &str =
    "0x3f82b6d1a94c07e55b60f2c8de13a97640cb5d218e9f06a3174c8b5e2d90f1c6";
