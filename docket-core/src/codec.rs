//! Record codec: attestation payload decoding and generation detection.
//!
//! Attestation payloads arrive as a JSON field list
//! (`[{ "name": .., "type": .., "value": .. }, ..]`). The codec never
//! fails on an *absent* field (accessors return empty/zero defaults),
//! but a payload that is not a field list at all is `CodecError::Malformed`.
//!
//! The ledger has no in-band layout version, so document generations are
//! detected structurally through an explicit ordered list of matchers,
//! newest first. The matched generation is tagged on the decoded record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::CodecError;
use crate::types::{
    Attestation, AttestationId, DocumentGeneration, DocumentRecord, DocumentStatus,
    OrganizationRecord, OrganizationStatus,
};

/// One decoded payload field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub value: Value,
}

/// A decoded attestation payload.
#[derive(Debug, Clone, Default)]
pub struct DecodedPayload {
    fields: Vec<DecodedField>,
}

impl DecodedPayload {
    /// Parse a field-list JSON string.
    pub fn parse(json: &str) -> Result<Self, CodecError> {
        let fields: Vec<DecodedField> = serde_json::from_str(json)
            .map_err(|e| CodecError::Malformed(format!("not a field list: {}", e)))?;
        Ok(Self { fields })
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    fn raw(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| {
            // Some indexers nest the concrete value one level down.
            match &f.value {
                Value::Object(map) => map.get("value").unwrap_or(&f.value),
                other => other,
            }
        })
    }

    /// String field, empty default when absent.
    pub fn string_field(&self, name: &str) -> String {
        match self.raw(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    /// First present string among several historical field names.
    pub fn first_string(&self, names: &[&str]) -> String {
        for name in names {
            if self.has(name) {
                return self.string_field(name);
            }
        }
        String::new()
    }

    /// Unsigned integer field, zero default when absent.
    pub fn u64_field(&self, name: &str) -> u64 {
        match self.raw(name) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// Boolean field, false default when absent.
    pub fn bool_field(&self, name: &str) -> bool {
        matches!(self.raw(name), Some(Value::Bool(true)))
    }
}

/// Detect which historical document layout a payload uses.
///
/// Matchers run newest-first; the first match wins:
/// 1. current - carries a previous-version pointer, version is computed
/// 2. transitional - voting transaction plus an inline version field
/// 3. legacy - voting transaction without a version field (also the
///    fallback when nothing matches)
pub fn detect_generation(payload: &DecodedPayload) -> DocumentGeneration {
    if payload.has("previousVersionId") {
        return DocumentGeneration::V3Current;
    }
    if payload.has("votingTransactionHash") && payload.has("version") {
        return DocumentGeneration::V2Transitional;
    }
    DocumentGeneration::V1Legacy
}

fn timestamps(att: &Attestation) -> (DateTime<Utc>, DateTime<Utc>) {
    let created = DateTime::<Utc>::from_timestamp(att.time, 0).unwrap_or_else(Utc::now);
    (created, Utc::now())
}

/// Decode an organization attestation into its cache entity.
///
/// Revoked attestations decode with status `Inactive`; the merge step
/// keeps that forced status regardless of prior cache state.
pub fn decode_organization(att: &Attestation) -> Result<OrganizationRecord, CodecError> {
    let payload = DecodedPayload::parse(&att.decoded_data_json)?;
    let (created_at, updated_at) = timestamps(att);

    let status = if att.revoked {
        OrganizationStatus::Inactive
    } else {
        OrganizationStatus::Active
    };

    Ok(OrganizationRecord {
        attestation_id: att.id.clone(),
        name: payload.string_field("name"),
        description: payload.string_field("description"),
        location: payload.string_field("location"),
        member_count: payload.u64_field("memberCount"),
        size_class: payload.string_field("sizeClass"),
        status,
        contact_email: payload.string_field("contactEmail"),
        contact_phone: payload.string_field("contactPhone"),
        logo_url: payload.string_field("logoUrl"),
        website_url: payload.string_field("websiteUrl"),
        admin_address: att.author.clone(),
        created_at,
        updated_at,
    })
}

/// Decode a document attestation into its cache entity.
///
/// `version` is left at 0 here; the version chain resolver assigns the
/// real sequential number during reconciliation. The owning-organization
/// reference is normalized (case- and prefix-insensitive) before use.
pub fn decode_document(att: &Attestation) -> Result<DocumentRecord, CodecError> {
    let payload = DecodedPayload::parse(&att.decoded_data_json)?;
    let generation = detect_generation(&payload);
    let (created_at, updated_at) = timestamps(att);

    let org_raw = payload.string_field("organizationId");
    let organization_id =
        AttestationId::parse(&org_raw).ok_or_else(|| CodecError::InvalidIdentifier {
            field: "organizationId".to_string(),
            value: org_raw,
        })?;

    let previous_raw = payload.first_string(&["previousVersionId", "previousDocumentId"]);
    let previous_version_id = if previous_raw.is_empty() {
        None
    } else {
        AttestationId::parse(&previous_raw).filter(|id| !id.is_zero())
    };
    if !previous_raw.is_empty() && previous_version_id.is_none() {
        debug!(
            attestation_id = %att.id,
            previous = %previous_raw,
            "Unparseable or zero previous-version pointer, treating as first version"
        );
    }

    let voting_raw = payload.first_string(&["votingTxHash", "votingTransactionHash"]);
    let voting_tx_hash = if voting_raw.is_empty() {
        None
    } else {
        Some(voting_raw)
    };

    let status = if att.revoked {
        DocumentStatus::Revoked
    } else {
        DocumentStatus::Active
    };

    Ok(DocumentRecord {
        attestation_id: att.id.clone(),
        title: payload.string_field("title"),
        document_type: payload.string_field("documentType"),
        content_hash: payload.first_string(&["contentHash", "documentHash"]),
        content_ref: payload.string_field("contentRef"),
        version: 0,
        previous_version_id,
        status,
        attester: att.author.clone(),
        organization_id,
        voting_tx_hash,
        schema_version: generation,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, SchemaId};
    use serde_json::json;

    fn attestation(decoded: Value, revoked: bool) -> Attestation {
        Attestation {
            id: AttestationId::parse(&"ab".repeat(32)).unwrap(),
            author: Address::parse(&format!("0x{}", "aa".repeat(20))).unwrap(),
            recipient: None,
            time: 1_700_000_000,
            revocable: true,
            revoked,
            schema_id: SchemaId::parse(&"cd".repeat(32)).unwrap(),
            data: "0x".to_string(),
            decoded_data_json: decoded.to_string(),
        }
    }

    fn field(name: &str, value: Value) -> Value {
        json!({ "name": name, "type": "string", "value": value })
    }

    #[test]
    fn test_malformed_payload_fails() {
        assert!(DecodedPayload::parse("not json").is_err());
        assert!(DecodedPayload::parse("{\"a\":1}").is_err());
        // An empty field list is fine; absent fields default.
        let empty = DecodedPayload::parse("[]").unwrap();
        assert_eq!(empty.string_field("name"), "");
        assert_eq!(empty.u64_field("memberCount"), 0);
    }

    #[test]
    fn test_generation_matchers_newest_first() {
        let current = DecodedPayload::parse(
            &json!([field("previousVersionId", json!("0x00")), field("votingTxHash", json!("0xff"))])
                .to_string(),
        )
        .unwrap();
        assert_eq!(detect_generation(&current), DocumentGeneration::V3Current);

        let transitional = DecodedPayload::parse(
            &json!([
                field("votingTransactionHash", json!("0xff")),
                field("version", json!(3))
            ])
            .to_string(),
        )
        .unwrap();
        assert_eq!(detect_generation(&transitional), DocumentGeneration::V2Transitional);

        let legacy = DecodedPayload::parse(
            &json!([field("votingTransactionHash", json!("0xff"))]).to_string(),
        )
        .unwrap();
        assert_eq!(detect_generation(&legacy), DocumentGeneration::V1Legacy);

        let bare = DecodedPayload::parse(&json!([field("title", json!("t"))]).to_string()).unwrap();
        assert_eq!(detect_generation(&bare), DocumentGeneration::V1Legacy);
    }

    #[test]
    fn test_decode_organization_defaults() {
        let att = attestation(json!([field("name", json!("Acme"))]), false);
        let org = decode_organization(&att).unwrap();
        assert_eq!(org.name, "Acme");
        assert_eq!(org.description, "");
        assert_eq!(org.member_count, 0);
        assert_eq!(org.status, OrganizationStatus::Active);
        assert_eq!(org.admin_address, att.author);
    }

    #[test]
    fn test_decode_organization_revoked_is_inactive() {
        let att = attestation(json!([field("name", json!("Acme"))]), true);
        let org = decode_organization(&att).unwrap();
        assert_eq!(org.status, OrganizationStatus::Inactive);
    }

    #[test]
    fn test_decode_document_zero_previous_is_first_version() {
        let org_id = "11".repeat(32);
        let att = attestation(
            json!([
                field("title", json!("Charter")),
                field("organizationId", json!(format!("0x{}", org_id))),
                field("previousVersionId", json!(crate::constants::ZERO_ID)),
            ]),
            false,
        );
        let doc = decode_document(&att).unwrap();
        assert!(doc.previous_version_id.is_none());
        assert_eq!(doc.version, 0); // unresolved until sync
        assert_eq!(doc.schema_version, DocumentGeneration::V3Current);
    }

    #[test]
    fn test_decode_document_normalizes_org_ref() {
        let org_id = "AB".repeat(32);
        let att = attestation(
            json!([
                field("title", json!("Charter")),
                field("organizationId", json!(org_id)),
            ]),
            false,
        );
        let doc = decode_document(&att).unwrap();
        assert_eq!(
            doc.organization_id.as_str(),
            format!("0x{}", "ab".repeat(32))
        );
    }

    #[test]
    fn test_decode_document_missing_org_fails() {
        let att = attestation(json!([field("title", json!("Charter"))]), false);
        assert!(decode_document(&att).is_err());
    }

    #[test]
    fn test_nested_value_objects_unwrap() {
        let att = attestation(
            json!([
                { "name": "name", "type": "string", "value": { "name": "name", "type": "string", "value": "Nested" } }
            ]),
            false,
        );
        let org = decode_organization(&att).unwrap();
        assert_eq!(org.name, "Nested");
    }
}
