//! Ledger index query client.
//!
//! Issues paginated, filtered queries against the external attestation
//! index with bounded retry and exponential backoff on transient
//! failure. The [`LedgerSource`] trait abstracts the index so the
//! reconciliation engine can run against the HTTP client in production
//! and [`MockLedger`] in tests.

pub mod client;
pub mod error;
pub mod query;
pub mod retry;

pub use client::{HttpLedgerClient, LedgerConfig, LedgerSource, MockLedger};
pub use error::{LedgerError, LedgerResult};
pub use query::{AttestationDto, QueryRequest, QueryResponse};
pub use retry::RetryStrategy;
