//! Wallet authentication middleware
//!
//! Write endpoints require an `Authorization: Wallet <base64>` header
//! carrying a signed, timestamped message. Verification is pure header +
//! clock; the replay window bounds how long a captured header stays
//! usable.

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use docket_core::{authenticate_request, Address};

use crate::error::ApiError;

/// Extension inserted for downstream handlers once the header verifies.
#[derive(Debug, Clone)]
pub struct AuthenticatedWallet(pub Address);

pub async fn wallet_auth(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match authenticate_request(header, Utc::now().timestamp_millis()) {
        Ok(address) => {
            tracing::debug!(wallet = %address, "Wallet authenticated");
            request.extensions_mut().insert(AuthenticatedWallet(address));
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Wallet authentication rejected");
            Err(ApiError::Unauthorized(rejection.to_string()))
        }
    }
}
