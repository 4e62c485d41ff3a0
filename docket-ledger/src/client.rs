//! Ledger Source Clients
//!
//! Defines the [`LedgerSource`] interface the reconciliation engine
//! consumes, with two implementations:
//! - [`HttpLedgerClient`] - the production index client
//! - [`MockLedger`] - in-memory double for tests

use async_trait::async_trait;
use reqwest::Client;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use docket_core::{Attestation, AttestationId, SchemaId};

use crate::error::{LedgerError, LedgerResult};
use crate::query::{AttestationDto, QueryRequest, QueryResponse};
use crate::retry::RetryStrategy;

/// Ledger index connection configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Index service base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8710".to_string(),
            timeout_secs: 30,
            max_retries: RetryStrategy::default_max_retries(),
            base_delay_ms: docket_core::constants::DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - DOCKET_LEDGER_URL: index service base URL
    /// - DOCKET_LEDGER_TIMEOUT: request timeout in seconds
    /// - DOCKET_LEDGER_MAX_RETRIES: retry bound
    /// - DOCKET_LEDGER_RETRY_DELAY_MS: backoff base delay
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("DOCKET_LEDGER_URL").unwrap_or(defaults.base_url),
            timeout_secs: env::var("DOCKET_LEDGER_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            max_retries: env::var("DOCKET_LEDGER_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay_ms: env::var("DOCKET_LEDGER_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
        }
    }
}

/// Read interface over the attestation index.
///
/// Object-safe so the engine can hold `Arc<dyn LedgerSource>`.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Fetch one page of attestations of one schema, newest first,
    /// revoked records included: up to `limit` records starting at
    /// offset `skip`.
    async fn query_page(
        &self,
        schema_id: &SchemaId,
        limit: u32,
        skip: u32,
    ) -> LedgerResult<Vec<Attestation>>;

    /// Fetch a single attestation; `Ok(None)` when the index has no
    /// record for the id.
    async fn query_by_id(&self, id: &AttestationId) -> LedgerResult<Option<Attestation>>;

    /// Fetch the complete record set for one schema, paging with
    /// `page_limit` per request until a short page marks the end.
    async fn query_by_schema(
        &self,
        schema_id: &SchemaId,
        page_limit: u32,
    ) -> LedgerResult<Vec<Attestation>> {
        let mut all = Vec::new();
        let mut skip = 0u32;
        loop {
            let page = self.query_page(schema_id, page_limit, skip).await?;
            let fetched = page.len() as u32;
            all.extend(page);
            if fetched < page_limit || fetched == 0 {
                return Ok(all);
            }
            skip += fetched;
        }
    }
}

/// HTTP client for the attestation index.
pub struct HttpLedgerClient {
    client: Client,
    config: LedgerConfig,
    strategy: RetryStrategy,
}

impl HttpLedgerClient {
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let strategy = RetryStrategy::Exponential {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.base_delay_ms * 16,
            multiplier: 2.0,
        };
        Ok(Self {
            client,
            config,
            strategy,
        })
    }

    /// Run `op` with bounded retry on transient failures.
    ///
    /// After exhausting the bound the last error is surfaced as
    /// `RetryExhausted`.
    async fn with_retry<T, F, Fut>(&self, what: &str, op: F) -> LedgerResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = LedgerResult<T>>,
    {
        let mut last_error: Option<LedgerError> = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.strategy.delay_for_attempt(attempt);
                debug!(what, attempt, delay_ms = delay.as_millis() as u64, "Retrying ledger query");
                tokio::time::sleep(delay).await;
            }
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() => {
                    warn!(what, attempt, error = %e, "Transient ledger query failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        let last = last_error.expect("retry loop always records an error before exhausting");
        Err(LedgerError::RetryExhausted {
            attempts: self.config.max_retries + 1,
            last_error: last.to_string(),
        })
    }

    async fn post_query(&self, request: &QueryRequest) -> LedgerResult<Vec<Attestation>> {
        let url = format!("{}/v1/attestations/query", self.config.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Status {
                status: status.as_u16(),
            });
        }
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(body
            .attestations
            .into_iter()
            .filter_map(AttestationDto::into_attestation)
            .collect())
    }

    async fn get_by_id(&self, id: &AttestationId) -> LedgerResult<Option<Attestation>> {
        let url = format!("{}/v1/attestations/{}", self.config.base_url, id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LedgerError::Status {
                status: status.as_u16(),
            });
        }
        let dto: AttestationDto = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(dto.into_attestation())
    }
}

#[async_trait]
impl LedgerSource for HttpLedgerClient {
    async fn query_page(
        &self,
        schema_id: &SchemaId,
        limit: u32,
        skip: u32,
    ) -> LedgerResult<Vec<Attestation>> {
        let request = QueryRequest::by_schema(schema_id, limit, skip);
        self.with_retry("query_page", || self.post_query(&request))
            .await
    }

    async fn query_by_id(&self, id: &AttestationId) -> LedgerResult<Option<Attestation>> {
        self.with_retry("query_by_id", || self.get_by_id(id)).await
    }
}

// ============================================================================
// Mock Ledger for Testing
// ============================================================================

/// In-memory ledger double.
///
/// Holds attestations directly; `set_fail` flips every query into a
/// transport error to exercise failure paths.
#[derive(Default)]
pub struct MockLedger {
    records: Arc<RwLock<Vec<Attestation>>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, attestation: Attestation) {
        self.records.write().await.push(attestation);
    }

    /// Replace a record in place, e.g. to flip its revoked flag.
    pub async fn update(&self, attestation: Attestation) {
        let mut records = self.records.write().await;
        if let Some(slot) = records.iter_mut().find(|a| a.id == attestation.id) {
            *slot = attestation;
        } else {
            records.push(attestation);
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn failing(&self) -> bool {
        self.fail.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerSource for MockLedger {
    async fn query_page(
        &self,
        schema_id: &SchemaId,
        limit: u32,
        skip: u32,
    ) -> LedgerResult<Vec<Attestation>> {
        if self.failing() {
            return Err(LedgerError::Transport("mock failure mode".to_string()));
        }
        let records = self.records.read().await;
        let mut matched: Vec<Attestation> = records
            .iter()
            .filter(|a| a.has_schema(schema_id))
            .cloned()
            .collect();
        matched.sort_by_key(|a| std::cmp::Reverse(a.time));
        Ok(matched
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn query_by_id(&self, id: &AttestationId) -> LedgerResult<Option<Attestation>> {
        if self.failing() {
            return Err(LedgerError::Transport("mock failure mode".to_string()));
        }
        let records = self.records.read().await;
        Ok(records.iter().find(|a| &a.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::Address;

    fn attestation(id_byte: &str, schema: &SchemaId, time: i64) -> Attestation {
        Attestation {
            id: AttestationId::parse(&id_byte.repeat(32)).unwrap(),
            author: Address::parse(&format!("0x{}", "aa".repeat(20))).unwrap(),
            recipient: None,
            time,
            revocable: true,
            revoked: false,
            schema_id: schema.clone(),
            data: String::new(),
            decoded_data_json: "[]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_ledger_schema_filter_and_order() {
        let schema_a = SchemaId::parse(&"0a".repeat(32)).unwrap();
        let schema_b = SchemaId::parse(&"0b".repeat(32)).unwrap();
        let ledger = MockLedger::new();
        ledger.add(attestation("11", &schema_a, 100)).await;
        ledger.add(attestation("22", &schema_a, 300)).await;
        ledger.add(attestation("33", &schema_b, 200)).await;

        let page = ledger.query_by_schema(&schema_a, 10).await.unwrap();
        assert_eq!(page.len(), 2);
        // Newest first
        assert_eq!(page[0].time, 300);
    }

    #[tokio::test]
    async fn test_query_by_schema_walks_all_pages() {
        let schema = SchemaId::parse(&"0a".repeat(32)).unwrap();
        let ledger = MockLedger::new();
        for (i, byte) in ["11", "22", "33", "44", "55"].into_iter().enumerate() {
            ledger.add(attestation(byte, &schema, 100 + i as i64)).await;
        }

        // Five records with a two-record page bound: three requests.
        let all = ledger.query_by_schema(&schema, 2).await.unwrap();
        assert_eq!(all.len(), 5);
        // Descending time preserved across page boundaries
        let times: Vec<i64> = all.iter().map(|a| a.time).collect();
        assert_eq!(times, vec![104, 103, 102, 101, 100]);

        // An exact multiple of the page bound terminates on the empty page.
        let all = ledger.query_by_schema(&schema, 5).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    fn retry_client(max_retries: u32) -> HttpLedgerClient {
        HttpLedgerClient::new(LedgerConfig {
            max_retries,
            base_delay_ms: 1,
            ..LedgerConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_on_transient_failure() {
        let client = retry_client(2);
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = calls.clone();
        let result: LedgerResult<()> = client
            .with_retry("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Err(LedgerError::Transport("down".to_string()))
                }
            })
            .await;

        match result {
            Err(LedgerError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_fails_fast_on_permanent_error() {
        let client = retry_client(2);
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = calls.clone();
        let result: LedgerResult<()> = client
            .with_retry("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Err(LedgerError::Status { status: 400 })
                }
            })
            .await;

        assert!(matches!(result, Err(LedgerError::Status { status: 400 })));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_transient_failure() {
        let client = retry_client(2);
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = calls.clone();
        let result = client
            .with_retry("test", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                        Err(LedgerError::Transport("blip".to_string()))
                    } else {
                        Ok(7u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mock_ledger_failure_mode() {
        let schema = SchemaId::parse(&"0a".repeat(32)).unwrap();
        let ledger = MockLedger::new();
        ledger.set_fail(true);
        let err = ledger.query_by_schema(&schema, 10).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_mock_ledger_query_by_id() {
        let schema = SchemaId::parse(&"0a".repeat(32)).unwrap();
        let ledger = MockLedger::new();
        let att = attestation("11", &schema, 100);
        let id = att.id.clone();
        ledger.add(att).await;

        assert!(ledger.query_by_id(&id).await.unwrap().is_some());
        let missing = AttestationId::parse(&"ff".repeat(32)).unwrap();
        assert!(ledger.query_by_id(&missing).await.unwrap().is_none());
    }
}
