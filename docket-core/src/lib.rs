//! Core types and primitives for the Docket attestation registry.
//!
//! This crate provides the foundation shared by the ledger client, the
//! cache store, the reconciliation engine, and the API layer:
//! - Identifier and address newtypes with strict hex formats
//! - Attestation and cache-entity data structures
//! - The record codec with schema-generation detection
//! - Wallet authorization primitives (message building, signature
//!   verification, write-path header authentication)
//! - Error types using thiserror

pub mod auth;
pub mod codec;
pub mod constants;
pub mod error;
pub mod types;

pub use auth::{authenticate_request, build_message, sign_message, verify, AuthRejection};
pub use codec::{
    decode_document, decode_organization, detect_generation, DecodedField, DecodedPayload,
};
pub use error::CodecError;
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
