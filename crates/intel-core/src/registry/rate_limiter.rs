//! Sliding-window rate limiter for one provider.
//!
//! Each provider publishes a contract such as "5 requests per minute" or
//! "100 requests per day". A limiter admits at most `capacity` requests in
//! any rolling `window`; callers over the limit are suspended, never refused.
//! One instance exists per provider and is shared by every aggregation.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::models::ProviderKind;

/// A provider's published request budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateLimit {
    Unlimited,
    Windowed {
        /// Maximum requests admitted per window.
        capacity: u32,
        /// Window length in milliseconds.
        window_ms: u64,
    },
}

impl RateLimit {
    pub fn per_window(capacity: u32, window: Duration) -> Self {
        Self::Windowed {
            capacity: capacity.max(1),
            window_ms: window.as_millis().max(1) as u64,
        }
    }

    pub fn per_second(capacity: u32) -> Self {
        Self::per_window(capacity, Duration::from_secs(1))
    }

    pub fn per_minute(capacity: u32) -> Self {
        Self::per_window(capacity, Duration::from_secs(60))
    }

    pub fn per_hour(capacity: u32) -> Self {
        Self::per_window(capacity, Duration::from_secs(3_600))
    }

    pub fn per_day(capacity: u32) -> Self {
        Self::per_window(capacity, Duration::from_secs(86_400))
    }
}

/// Point-in-time view of a limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    /// Slots available right now. `None` means unlimited.
    pub remaining: Option<u32>,
    /// Time until the oldest admission leaves the window. `None` when nothing is pending.
    pub reset_in: Option<Duration>,
}

/// Per-provider sliding-window limiter.
///
/// Thread-safe; admission decisions are serialized under a mutex and the
/// wait itself happens outside the lock.
#[derive(Debug)]
pub struct RateLimiter {
    provider: ProviderKind,
    limit: RateLimit,
    /// Admission instants still inside the window, oldest first.
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(provider: ProviderKind, limit: RateLimit) -> Self {
        Self {
            provider,
            limit,
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    /// Limiter that admits everything immediately.
    pub fn unlimited(provider: ProviderKind) -> Self {
        Self::new(provider, RateLimit::Unlimited)
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Lock the admission log, recovering from poison if necessary.
    ///
    /// The log only holds timestamps, so a poisoned lock at worst admits
    /// one request early.
    fn lock_admitted(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.admitted.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Rate limiter mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    /// Wait (asynchronously) until a slot is free, then take it.
    ///
    /// Never fails. Callers that cannot tolerate the wait race this future
    /// against their own deadline.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.admit_or_wait(Instant::now()) {
                None => {
                    debug!("Rate limiter: acquired slot for '{}'", self.provider);
                    return;
                }
                Some(wait) => wait,
            };

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait, self.provider
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> bool {
        self.admit_or_wait(Instant::now()).is_none()
    }

    /// Current remaining quota and time to the next freed slot.
    pub fn snapshot(&self) -> RateLimitSnapshot {
        let (capacity, window) = match self.limit {
            RateLimit::Unlimited => {
                return RateLimitSnapshot {
                    remaining: None,
                    reset_in: None,
                }
            }
            RateLimit::Windowed {
                capacity,
                window_ms,
            } => (capacity, Duration::from_millis(window_ms)),
        };

        let now = Instant::now();
        let mut admitted = self.lock_admitted();
        prune(&mut admitted, now, window);

        RateLimitSnapshot {
            remaining: Some(capacity.saturating_sub(admitted.len() as u32)),
            reset_in: admitted
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now)),
        }
    }

    /// Admit at `now` and return `None`, or return how long to wait.
    fn admit_or_wait(&self, now: Instant) -> Option<Duration> {
        let (capacity, window) = match self.limit {
            RateLimit::Unlimited => return None,
            RateLimit::Windowed {
                capacity,
                window_ms,
            } => (capacity as usize, Duration::from_millis(window_ms)),
        };

        let mut admitted = self.lock_admitted();
        prune(&mut admitted, now, window);

        if admitted.len() < capacity {
            admitted.push_back(now);
            return None;
        }

        let oldest = admitted.front().copied().unwrap_or(now);
        Some((oldest + window).saturating_duration_since(now).max(Duration::from_millis(1)))
    }
}

/// Drop admissions that have left the window.
fn prune(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = admitted.front() {
        if now.saturating_duration_since(*oldest) >= window {
            admitted.pop_front();
        } else {
            break;
        }
    }
}
