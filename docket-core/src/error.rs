//! Core Error Types

use thiserror::Error;

/// Record codec errors.
///
/// A `Malformed` payload means the record cannot be interpreted at all;
/// callers skip the offending record and continue the batch. Absent
/// optional fields are *not* errors - the codec fills defaults.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Payload could not be parsed as a field list
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// A required identifier field is invalid
    #[error("Invalid identifier in field '{field}': {value}")]
    InvalidIdentifier { field: String, value: String },
}

/// Core result type.
pub type CoreResult<T, E = CodecError> = std::result::Result<T, E>;
