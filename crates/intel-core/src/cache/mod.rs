//! Single-flight result cache using moka.
//!
//! Results are memoized per (provider, company, metric set). Concurrent
//! callers asking for the same key share one in-flight fetch. Entries expire
//! by TTL only; the cache has no capacity bound.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use moka::future::Cache;
use moka::Expiry;

use crate::config::IntelConfig;
use crate::models::{CompanyKey, MetricClass, MetricSet, Outcome, ProviderKind, ProviderResult};

/// Deterministic identity of one connector call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: ProviderKind,
    pub company: CompanyKey,
    /// Metrics requested from this provider. Different subsets are different entries.
    pub metrics: MetricSet,
}

impl CacheKey {
    pub fn new(provider: ProviderKind, company: CompanyKey, metrics: MetricSet) -> Self {
        Self {
            provider,
            company,
            metrics,
        }
    }
}

/// Time-to-live pair for one provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheTtl {
    pub success: Duration,
    /// Negative-cache TTL applied to failures and rate limits.
    pub failure: Duration,
}

impl CacheTtl {
    pub fn new(success: Duration, failure: Duration) -> Self {
        Self { success, failure }
    }

    /// Fallback when a provider has no configured TTLs.
    pub fn for_class(class: MetricClass) -> Self {
        match class {
            MetricClass::Slow => Self::new(Duration::from_secs(6 * 3_600), Duration::from_secs(30)),
            MetricClass::Fast => Self::new(Duration::from_secs(60), Duration::from_secs(30)),
        }
    }

    /// TTL for a specific result.
    pub fn for_result(&self, result: &ProviderResult) -> Duration {
        match result.outcome() {
            Outcome::Success { .. } => self.success,
            Outcome::Failure { .. } => self.failure,
            Outcome::RateLimited {
                retry_after: Some(wait),
            } => (*wait).min(self.failure),
            Outcome::RateLimited { retry_after: None } => self.failure,
        }
    }
}

struct ResultExpiry {
    ttls: Arc<BTreeMap<ProviderKind, CacheTtl>>,
}

impl ResultExpiry {
    fn ttl(&self, provider: ProviderKind) -> CacheTtl {
        self.ttls
            .get(&provider)
            .copied()
            .unwrap_or_else(|| CacheTtl::for_class(provider.metric_class()))
    }
}

impl Expiry<CacheKey, Arc<ProviderResult>> for ResultExpiry {
    fn expire_after_create(
        &self,
        key: &CacheKey,
        value: &Arc<ProviderResult>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl(key.provider).for_result(value))
    }
}

/// Shared get-or-fetch memoization for connector results.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct ResultCache {
    entries: Cache<CacheKey, Arc<ProviderResult>>,
    ttls: Arc<BTreeMap<ProviderKind, CacheTtl>>,
}

impl ResultCache {
    pub fn new(ttls: impl IntoIterator<Item = (ProviderKind, CacheTtl)>) -> Self {
        let ttls: Arc<BTreeMap<_, _>> = Arc::new(ttls.into_iter().collect());
        let entries = Cache::builder()
            .expire_after(ResultExpiry {
                ttls: Arc::clone(&ttls),
            })
            .build();
        Self { entries, ttls }
    }

    /// TTLs taken from each provider's settings.
    pub fn from_config(config: &IntelConfig) -> Self {
        Self::new(config.providers.iter().map(|(provider, settings)| {
            (
                *provider,
                CacheTtl::new(settings.ttl_success(), settings.ttl_failure()),
            )
        }))
    }

    pub fn ttl(&self, provider: ProviderKind) -> CacheTtl {
        self.ttls
            .get(&provider)
            .copied()
            .unwrap_or_else(|| CacheTtl::for_class(provider.metric_class()))
    }

    /// Return the live entry for `key`, or run `fetch` and store its result.
    ///
    /// Concurrent calls with an identical key wait on the same `fetch`;
    /// only one of the supplied futures is ever polled.
    pub async fn get_or_fetch<F>(&self, key: CacheKey, fetch: F) -> Arc<ProviderResult>
    where
        F: Future<Output = ProviderResult>,
    {
        let provider = key.provider;
        let ticker = key.company.ticker().to_string();
        self.entries
            .get_with(key, async move {
                debug!("Cache miss for {} / {}, fetching", provider, ticker);
                Arc::new(fetch.await)
            })
            .await
    }

    /// Live entry for `key` without fetching.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<ProviderResult>> {
        self.entries.get(key).await
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.entries.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Number of live entries after pending maintenance has run.
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entries.entry_count())
            .field("ttls", &self.ttls)
            .finish()
    }
}
