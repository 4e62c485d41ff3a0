//! Request middleware

pub mod rate_limit;
pub mod wallet;

pub use rate_limit::{
    rate_limit, Decision, MemoryRateLimitStore, RateLimitConfig, RateLimitStore, RateLimiter,
};
pub use wallet::{wallet_auth, AuthenticatedWallet};
