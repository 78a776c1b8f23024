//! HTTP middleware stack.
//!
//! Outermost first: trace, CORS, rate limit, idempotency guard.

pub mod cors;
pub mod idempotency;
pub mod rate_limit;
pub mod trace;
