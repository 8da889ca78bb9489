//! Security Module
//!
//! Provides security features for the Szkolnik API:
//! - Caller identity resolution (API Key + JWT)
//! - Daily search quota for non-premium callers
//! - Security headers middleware

pub mod auth;
pub mod middleware;
pub mod quota;

pub use auth::{CallerIdentity, Credentials, IdentityResolver, JwtIdentityResolver};
pub use quota::{QuotaClient, QuotaDecision, SearchQuota};
