//! Query Retry Mechanism
//!
//! Bounded retry with exponential backoff for ledger index queries.

use std::time::Duration;

use docket_core::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS};

/// Retry strategy
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// No retry
    None,
    /// Fixed delay between retries
    Fixed { delay_ms: u64 },
    /// Exponential backoff
    Exponential {
        base_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS * 16,
            multiplier: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Calculate delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::None => Duration::ZERO,
            RetryStrategy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            RetryStrategy::Exponential {
                base_delay_ms,
                max_delay_ms,
                multiplier,
            } => {
                let delay = (*base_delay_ms as f64) * multiplier.powi(attempt as i32 - 1);
                let delay = delay.min(*max_delay_ms as f64);
                Duration::from_millis(delay as u64)
            }
        }
    }

    /// Default retry bound (retries after the first attempt).
    pub fn default_max_retries() -> u32 {
        DEFAULT_MAX_RETRIES
    }
}
