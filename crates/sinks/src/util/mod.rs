//! Shared sink utilities

mod rate_limited;

pub use rate_limited::RateLimitedLogger;
