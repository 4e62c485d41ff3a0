//! Ledger Client Error Types

use thiserror::Error;

/// Ledger query errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Network-level failure (connect, timeout, body read)
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the index service
    #[error("Ledger index returned status {status}")]
    Status { status: u16 },

    /// Retry bound exhausted; carries the last failure
    #[error("Ledger query retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// Response body could not be decoded
    #[error("Ledger response decode error: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Whether a retry may be worthwhile.
    ///
    /// Transport failures and 5xx/429 statuses are transient; other
    /// statuses and decode failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Transport(_) => true,
            LedgerError::Status { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Transport(e.to_string())
    }
}

/// Ledger result type.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::Transport("reset".to_string()).is_transient());
        assert!(LedgerError::Status { status: 503 }.is_transient());
        assert!(LedgerError::Status { status: 429 }.is_transient());
        assert!(!LedgerError::Status { status: 404 }.is_transient());
        assert!(!LedgerError::Decode("bad json".to_string()).is_transient());
    }
}
