//! Attestation ledger record.

use serde::{Deserialize, Serialize};

use super::common::{Address, AttestationId, SchemaId};

/// An immutable record from the external attestation ledger.
///
/// Once written, every field except `revoked` is frozen; `revoked` may
/// only transition `false` → `true` and only by the original author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    /// Ledger-assigned 32-byte identifier, globally unique
    pub id: AttestationId,
    /// Address of the signer who submitted the record
    pub author: Address,
    /// Optional target address (zero sentinel treated as none)
    pub recipient: Option<Address>,
    /// Ledger-assigned timestamp (seconds)
    pub time: i64,
    /// Whether the record may be revoked at all
    pub revocable: bool,
    /// Revocation flag, monotonic false → true
    pub revoked: bool,
    /// Field layout identifier
    pub schema_id: SchemaId,
    /// Raw encoded payload
    pub data: String,
    /// Decoded field list as JSON
    pub decoded_data_json: String,
}

impl Attestation {
    /// Whether this record carries the given schema.
    pub fn has_schema(&self, schema_id: &SchemaId) -> bool {
        &self.schema_id == schema_id
    }
}
