//! Process-wide set of per-provider rate limiters.
//!
//! Built once from configuration and injected into every connector and into
//! the aggregator. Nothing looks limiters up through static state, so tests
//! can hand in fast or unlimited ones.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rate_limiter::{RateLimit, RateLimiter};
use crate::errors::IntelError;
use crate::models::ProviderKind;

/// Quota view for the health-check collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: ProviderKind,
    /// `None` means the provider is unlimited.
    pub remaining_quota: Option<u32>,
    /// When the next slot frees up. `None` when nothing is pending.
    pub next_reset: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone)]
pub struct RateLimiterRegistry {
    limiters: BTreeMap<ProviderKind, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one limiter per provider built from the given limits.
    pub fn from_limits(limits: impl IntoIterator<Item = (ProviderKind, RateLimit)>) -> Self {
        let mut registry = Self::new();
        for (provider, limit) in limits {
            registry.insert(Arc::new(RateLimiter::new(provider, limit)));
        }
        registry
    }

    /// Register a limiter, replacing any previous one for the same provider.
    pub fn insert(&mut self, limiter: Arc<RateLimiter>) {
        self.limiters.insert(limiter.provider(), limiter);
    }

    /// Shared limiter for a provider.
    pub fn get(&self, provider: ProviderKind) -> Option<Arc<RateLimiter>> {
        self.limiters.get(&provider).cloned()
    }

    /// Limiter for a provider, creating an unlimited one if none was configured.
    pub fn get_or_unlimited(&mut self, provider: ProviderKind) -> Arc<RateLimiter> {
        self.limiters
            .entry(provider)
            .or_insert_with(|| Arc::new(RateLimiter::unlimited(provider)))
            .clone()
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.limiters.keys().copied()
    }

    /// Quota view of one provider's limiter.
    pub fn health(&self, provider: ProviderKind) -> Result<ProviderHealth, IntelError> {
        let limiter = self
            .limiters
            .get(&provider)
            .ok_or(IntelError::UnknownProvider(provider))?;
        let snapshot = limiter.snapshot();

        let next_reset = match snapshot.reset_in {
            Some(wait) => Some(
                Utc::now()
                    + chrono::Duration::from_std(wait).map_err(|e| {
                        IntelError::Infrastructure(format!("reset time out of range: {}", e))
                    })?,
            ),
            None => None,
        };

        Ok(ProviderHealth {
            provider,
            remaining_quota: snapshot.remaining,
            next_reset,
        })
    }

    pub fn health_all(&self) -> Vec<ProviderHealth> {
        self.limiters
            .keys()
            .filter_map(|provider| self.health(*provider).ok())
            .collect()
    }
}
