//! Common identifier types.
//!
//! All ledger identifiers are fixed-width hex strings: attestation and
//! schema ids are 32 bytes, wallet addresses are 20 bytes. Parsing
//! normalizes to lowercase with a `0x` prefix so that equality is plain
//! string equality everywhere downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{ZERO_ADDRESS, ZERO_ID};

/// Normalize a reference field for comparison: lowercase, `0x`-prefix
/// insensitive. The index service cannot filter on decoded sub-fields,
/// so relational filtering happens client-side through this form.
pub fn normalize_ref(s: &str) -> String {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    s.to_ascii_lowercase()
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Opaque 32-byte attestation identifier, assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttestationId(String);

impl AttestationId {
    /// Parse a strict or `0x`-less 64-hex identifier, normalizing form.
    pub fn parse(s: &str) -> Option<Self> {
        let body = normalize_ref(s);
        if body.len() == 64 && is_hex(&body) {
            Some(Self(format!("0x{}", body)))
        } else {
            None
        }
    }

    /// The all-zero sentinel id.
    pub fn zero() -> Self {
        Self(ZERO_ID.to_string())
    }

    /// True for the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttestationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 32-byte schema identifier naming a payload field layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(String);

impl SchemaId {
    pub fn parse(s: &str) -> Option<Self> {
        let body = normalize_ref(s);
        if body.len() == 64 && is_hex(&body) {
            Some(Self(format!("0x{}", body)))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 20-byte wallet address in strict `0x` + 40-hex form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse a strict `0x` + 40-hex address (case-insensitive input).
    ///
    /// Unlike ids, the `0x` prefix is mandatory here: the write path
    /// validates inbound addresses against this exact pattern.
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
        if body.len() == 40 && is_hex(body) {
            Some(Self(format!("0x{}", body.to_ascii_lowercase())))
        } else {
            None
        }
    }

    /// Build an address from raw 20 bytes.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The all-zero sentinel address.
    pub fn zero() -> Self {
        Self(ZERO_ADDRESS.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }

    /// Case-insensitive comparison against an arbitrary string form.
    pub fn matches(&self, other: &str) -> bool {
        normalize_ref(other) == normalize_ref(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
