use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Classification for retry policy.
///
/// Used by connectors to decide whether a failed request is worth repeating.
///
/// # Behavior Summary
///
/// | Class | Retried inside the connector? | Surfaced as |
/// |-------|------------------------------|-------------|
/// | `Never` | No | `FAILURE` (permanent) |
/// | `WithBackoff` | Yes, until attempts run out | `FAILURE` (transient/timeout) |
/// | `RespectRetryAfter` | No, the provider told us when to come back | `RATE_LIMITED` |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad input, auth failure, unknown company or schema mismatch.
    Never,

    /// Retry with exponential backoff.
    ///
    /// Used for network failures, timeouts and 5xx responses.
    WithBackoff,

    /// The provider throttled us. Retrying before its reset only burns quota.
    RespectRetryAfter,
}

/// Bounded exponential backoff.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied per further attempt.
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries. Handy for tests.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            factor: 1.0,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed, or `None` when attempts are exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts.max(1) {
            return None;
        }
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay_ms as f64 * self.factor.max(1.0).powi(exponent);
        Some(Duration::from_millis(millis.min(u64::MAX as f64) as u64))
    }
}
