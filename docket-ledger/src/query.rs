//! Wire types for the ledger index query interface.
//!
//! The index accepts a schema filter, a revocation filter, descending
//! time ordering, and limit/skip pagination. It cannot filter on decoded
//! sub-fields; relational filters (e.g. "documents belonging to
//! organization X") run in the engine over decoded records.

use serde::{Deserialize, Serialize};
use tracing::warn;

use docket_core::{Address, Attestation, AttestationId, SchemaId};

/// Query request for the attestation index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    /// `None` means both revoked and live records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
    /// Ordering token; the index only supports descending ledger time
    pub order: String,
    pub limit: u32,
    pub skip: u32,
}

impl QueryRequest {
    /// Page query over one schema, revoked records included.
    pub fn by_schema(schema_id: &SchemaId, limit: u32, skip: u32) -> Self {
        Self {
            schema_id: Some(schema_id.as_str().to_string()),
            revoked: None,
            order: "time_desc".to_string(),
            limit,
            skip,
        }
    }
}

/// Query response from the attestation index.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub attestations: Vec<AttestationDto>,
}

/// One attestation as the index serves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationDto {
    pub id: String,
    pub author: String,
    #[serde(default)]
    pub recipient: Option<String>,
    pub time: i64,
    #[serde(default)]
    pub revocable: bool,
    #[serde(default)]
    pub revoked: bool,
    pub schema_id: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub decoded_data_json: String,
}

impl AttestationDto {
    /// Convert into the domain type, normalizing identifiers.
    ///
    /// Records with unparseable ids or authors are dropped with a WARN
    /// rather than failing the page; a zero recipient becomes `None`.
    pub fn into_attestation(self) -> Option<Attestation> {
        let id = match AttestationId::parse(&self.id) {
            Some(id) => id,
            None => {
                warn!(id = %self.id, "Dropping attestation with unparseable id");
                return None;
            }
        };
        let author = match Address::parse(&self.author) {
            Some(a) => a,
            None => {
                warn!(id = %id, author = %self.author, "Dropping attestation with unparseable author");
                return None;
            }
        };
        let schema_id = match SchemaId::parse(&self.schema_id) {
            Some(s) => s,
            None => {
                warn!(id = %id, schema = %self.schema_id, "Dropping attestation with unparseable schema id");
                return None;
            }
        };
        let recipient = self
            .recipient
            .as_deref()
            .and_then(Address::parse)
            .filter(|a| !a.is_zero());

        Some(Attestation {
            id,
            author,
            recipient,
            time: self.time,
            revocable: self.revocable,
            revoked: self.revoked,
            schema_id,
            data: self.data,
            decoded_data_json: self.decoded_data_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(id: &str, author: &str) -> AttestationDto {
        AttestationDto {
            id: id.to_string(),
            author: author.to_string(),
            recipient: None,
            time: 1_700_000_000,
            revocable: true,
            revoked: false,
            schema_id: format!("0x{}", "cd".repeat(32)),
            data: String::new(),
            decoded_data_json: "[]".to_string(),
        }
    }

    #[test]
    fn test_dto_conversion_normalizes() {
        let att = dto(&"AB".repeat(32), &format!("0x{}", "AA".repeat(20)))
            .into_attestation()
            .unwrap();
        assert_eq!(att.id.as_str(), format!("0x{}", "ab".repeat(32)));
        assert_eq!(att.author.as_str(), format!("0x{}", "aa".repeat(20)));
    }

    #[test]
    fn test_dto_conversion_drops_garbage() {
        assert!(dto("nope", &format!("0x{}", "aa".repeat(20)))
            .into_attestation()
            .is_none());
        assert!(dto(&"ab".repeat(32), "nope").into_attestation().is_none());
    }

    #[test]
    fn test_zero_recipient_is_none() {
        let mut d = dto(&"ab".repeat(32), &format!("0x{}", "aa".repeat(20)));
        d.recipient = Some(docket_core::constants::ZERO_ADDRESS.to_string());
        let att = d.into_attestation().unwrap();
        assert!(att.recipient.is_none());
    }
}
