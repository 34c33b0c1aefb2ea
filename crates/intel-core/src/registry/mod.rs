//! Provider admission control.
//!
//! This module provides:
//! - Per-provider sliding-window rate limiting
//! - The shared registry of limiters and its health view

mod limiters;
mod rate_limiter;

pub use limiters::{ProviderHealth, RateLimiterRegistry};
pub use rate_limiter::{RateLimit, RateLimitSnapshot, RateLimiter};
