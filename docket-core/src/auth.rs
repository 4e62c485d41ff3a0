//! Wallet authorization primitives.
//!
//! The registry's trust model hangs on one check, shared by the write
//! path and the reconciliation engine: does the signature over a message
//! belong to the claimed 20-byte address?
//!
//! Wire signature format: hex of 96 bytes - the 64-byte Ed25519
//! signature followed by the signer's 32-byte verifying key. Recovery
//! extracts the key, verifies the signature over the message bytes, and
//! derives the address as `0x || hex(sha256(pubkey)[..20])`. Anything
//! malformed yields `None`/`false`, never a panic or an error.
//!
//! Write-path authentication is a pure function of the
//! `Authorization: Wallet <base64(JSON)>` header and the clock; there is
//! no server-side nonce store. The 5-minute embedded-timestamp window is
//! the replay defense and must not be widened.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

use crate::constants::AUTH_REPLAY_WINDOW_MS;
use crate::types::Address;

/// Why a write request was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("Authorization header is missing")]
    MissingHeader,

    #[error("Authorization header is malformed")]
    MalformedHeader,

    #[error("Address does not match the required 20-byte hex pattern")]
    InvalidAddress,

    #[error("Signed message does not contain the claimed address")]
    AddressNotInMessage,

    #[error("Signed message carries no timestamp")]
    MissingTimestamp,

    #[error("Signed message is outside the replay window ({age_ms} ms old)")]
    Expired { age_ms: i64 },

    #[error("Signature does not verify against the claimed address")]
    BadSignature,
}

#[derive(Deserialize)]
struct WalletHeader {
    address: String,
    signature: String,
    message: String,
}

fn derive_address(key: &VerifyingKey) -> Address {
    let digest = Sha256::digest(key.to_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Address::from_bytes(&bytes)
}

/// Recover the address that produced `signature` over `message`.
///
/// Returns `None` for any malformed input or failed verification.
pub fn recover_signer(message: &str, signature: &str) -> Option<Address> {
    let raw = hex::decode(signature.strip_prefix("0x").unwrap_or(signature)).ok()?;
    if raw.len() != 96 {
        return None;
    }
    let sig = Signature::from_bytes(raw[..64].try_into().ok()?);
    let key = VerifyingKey::from_bytes(raw[64..].try_into().ok()?).ok()?;
    key.verify(message.as_bytes(), &sig).ok()?;
    Some(derive_address(&key))
}

/// Check whether `signature` over `message` belongs to `claimed`.
///
/// Comparison is case-insensitive; malformed input is `false`, never an
/// error.
pub fn verify(message: &str, signature: &str, claimed: &str) -> bool {
    match recover_signer(message, signature) {
        Some(addr) => addr.matches(claimed),
        None => false,
    }
}

/// Produce the wire signature for `message`: hex(sig || pubkey).
///
/// The wallet-side counterpart of [`recover_signer`]; also used by tests
/// to construct valid authentication headers.
pub fn sign_message(key: &SigningKey, message: &str) -> String {
    let sig = key.sign(message.as_bytes());
    let mut raw = Vec::with_capacity(96);
    raw.extend_from_slice(&sig.to_bytes());
    raw.extend_from_slice(&key.verifying_key().to_bytes());
    hex::encode(raw)
}

/// The address a signing key authenticates as.
pub fn address_of(key: &SigningKey) -> Address {
    derive_address(&key.verifying_key())
}

/// Strictly increasing millisecond timestamps for message building.
fn fresh_timestamp_ms() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);
    let now = chrono::Utc::now().timestamp_millis();
    LAST.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    })
    .map(|last| now.max(last + 1))
    .unwrap_or(now)
}

/// Build the message a wallet signs to authenticate as `address`.
///
/// Embeds the address, a monotonically fresh timestamp, and a random
/// nonce, so two calls for the same address never produce identical
/// messages.
pub fn build_message(address: &Address) -> String {
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);
    format!(
        "Docket Registry authentication\nAddress: {}\nTimestamp: {}\nNonce: {}",
        address,
        fresh_timestamp_ms(),
        hex::encode(nonce)
    )
}

/// Extract the embedded `Timestamp: <millis>` token from a message.
pub fn extract_timestamp(message: &str) -> Option<i64> {
    let start = message.find("Timestamp: ")? + "Timestamp: ".len();
    let rest = &message[start..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Authenticate a write request from its `Authorization` header.
///
/// Implements the full header contract:
/// 1. header present, `Wallet` scheme, valid base64 JSON with all of
///    `address`/`signature`/`message`
/// 2. address matches the strict 20-byte hex pattern
/// 3. message textually contains the address (case-insensitive)
/// 4. message embeds a `Timestamp: <millis>` within the 5-minute window
/// 5. the signature verifies against the address
///
/// Returns the authenticated address on success.
pub fn authenticate_request(
    header: Option<&str>,
    now_ms: i64,
) -> Result<Address, AuthRejection> {
    let header = header.ok_or(AuthRejection::MissingHeader)?;
    let encoded = header
        .strip_prefix("Wallet ")
        .ok_or(AuthRejection::MalformedHeader)?;

    let raw = BASE64
        .decode(encoded.trim())
        .map_err(|_| AuthRejection::MalformedHeader)?;
    let parsed: WalletHeader =
        serde_json::from_slice(&raw).map_err(|_| AuthRejection::MalformedHeader)?;

    let address = Address::parse(&parsed.address).ok_or(AuthRejection::InvalidAddress)?;

    if !parsed
        .message
        .to_ascii_lowercase()
        .contains(address.as_str())
    {
        return Err(AuthRejection::AddressNotInMessage);
    }

    let ts = extract_timestamp(&parsed.message).ok_or(AuthRejection::MissingTimestamp)?;
    let age_ms = now_ms - ts;
    if age_ms > AUTH_REPLAY_WINDOW_MS {
        return Err(AuthRejection::Expired { age_ms });
    }

    if !verify(&parsed.message, &parsed.signature, address.as_str()) {
        return Err(AuthRejection::BadSignature);
    }

    Ok(address)
}
