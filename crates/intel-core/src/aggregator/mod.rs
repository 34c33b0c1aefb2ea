//! Aggregation of many connectors into one company profile.
//!
//! One call runs dispatch, collect, resolve, score and finalize:
//! - every applicable connector is spawned concurrently behind the cache
//! - each fetch is bounded by its provider timeout, the whole call by a deadline
//! - successful fields are resolved per metric (see [`resolve`])
//! - failures become warnings and mark the profile partial; they never raise

pub mod resolve;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

use crate::cache::{CacheKey, ResultCache};
use crate::config::IntelConfig;
use crate::errors::IntelError;
use crate::models::{
    AggregatedProfile, CompanyKey, FailureClass, Metric, MetricSet, Outcome, ProviderKind,
    ProviderOutcome, ProviderResult, ProviderWarning, WarningKind,
};
use crate::provider::{build_connectors, Connector};
use crate::registry::{ProviderHealth, RateLimiterRegistry};
use crate::scoring::CompositeScorer;

pub use resolve::{resolve_fields, within_tolerance, Resolution};

const FALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans a request out to every connector and folds the results into an
/// [`AggregatedProfile`].
///
/// Cheap to share behind an `Arc`; rate limiters and the result cache are
/// shared by every concurrent `aggregate` call.
pub struct Aggregator {
    connectors: Vec<Arc<dyn Connector>>,
    limiters: RateLimiterRegistry,
    cache: ResultCache,
    timeouts: BTreeMap<ProviderKind, Duration>,
    tolerance: f64,
    scorer: CompositeScorer,
    default_deadline: Duration,
}

impl Aggregator {
    /// Assemble an aggregator from explicitly constructed parts.
    ///
    /// Connectors must already hold their limiter from `limiters`.
    pub fn new(
        connectors: Vec<Arc<dyn Connector>>,
        limiters: RateLimiterRegistry,
        cache: ResultCache,
        config: &IntelConfig,
    ) -> Self {
        let timeouts = config
            .providers
            .iter()
            .map(|(provider, settings)| (*provider, settings.timeout()))
            .collect();

        Self {
            connectors,
            limiters,
            cache,
            timeouts,
            tolerance: config.tolerance,
            scorer: CompositeScorer::new(config.min_scored_metrics),
            default_deadline: config.default_deadline(),
        }
    }

    /// Build every active connector, its limiter and the cache from configuration.
    pub fn from_config(config: &IntelConfig) -> Self {
        let mut limiters = config.build_limiters();
        let connectors = build_connectors(config, &mut limiters);
        Self::new(connectors, limiters, ResultCache::from_config(config), config)
    }

    /// Providers this aggregator dispatches to.
    pub fn providers(&self) -> Vec<ProviderKind> {
        self.connectors.iter().map(|c| c.kind()).collect()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn timeout_for(&self, provider: ProviderKind) -> Duration {
        self.timeouts
            .get(&provider)
            .copied()
            .unwrap_or(FALLBACK_TIMEOUT)
    }

    /// Aggregate `metrics` for `company` within `deadline` (configured default if `None`).
    ///
    /// Provider failures, timeouts and rate limits are reported through the
    /// profile's `partial` flag and warnings.
    ///
    /// # Errors
    ///
    /// Returns [`IntelError::InvalidCompanyKey`] when `company` fails validation
    /// and [`IntelError::EmptyMetricSet`] when `metrics` is empty.
    pub async fn aggregate(
        &self,
        company: &CompanyKey,
        metrics: &MetricSet,
        deadline: Option<Duration>,
    ) -> Result<AggregatedProfile, IntelError> {
        company.validate()?;
        if metrics.is_empty() {
            return Err(IntelError::EmptyMetricSet);
        }

        let budget = deadline.unwrap_or(self.default_deadline);
        let deadline_at = Instant::now() + budget;

        // Dispatch
        let mut pending = Vec::with_capacity(self.connectors.len());
        for connector in &self.connectors {
            let provider = connector.kind();
            let applicable = connector.capabilities().applicable(metrics);
            if applicable.is_empty() {
                debug!("Skipping {}: no requested metric supported", provider);
                continue;
            }

            let timeout = self.timeout_for(provider);
            let key = CacheKey::new(provider, company.clone(), applicable.clone());
            let cache = self.cache.clone();
            let connector = Arc::clone(connector);
            let company = company.clone();

            let handle = tokio::spawn(async move {
                cache
                    .get_or_fetch(key, async move {
                        match tokio::time::timeout(timeout, connector.fetch(&company, &applicable))
                            .await
                        {
                            Ok(result) => result,
                            Err(_) => {
                                warn!(
                                    "{} timed out after {} ms for {}",
                                    provider,
                                    timeout.as_millis(),
                                    company
                                );
                                ProviderResult::timeout(provider, timeout)
                            }
                        }
                    })
                    .await
            });
            pending.push((provider, handle));
        }

        // Collect
        let mut results: Vec<Arc<ProviderResult>> = Vec::with_capacity(pending.len());
        for (provider, handle) in pending {
            match tokio::time::timeout_at(deadline_at, handle).await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    warn!("{} task failed for {}: {}", provider, company, e);
                    results.push(Arc::new(ProviderResult::failure(
                        provider,
                        FailureClass::Permanent,
                        format!("connector task failed: {}", e),
                    )));
                }
                Err(_) => {
                    // Dropping the handle detaches the task; a late result still lands in the cache.
                    warn!(
                        "{} abandoned at the {} ms deadline for {}",
                        provider,
                        budget.as_millis(),
                        company
                    );
                    results.push(Arc::new(ProviderResult::timeout(provider, budget)));
                }
            }
        }
        results.sort_by_key(|r| r.provider());

        // Resolve and score
        let resolution = resolve_fields(
            results.iter().flat_map(|r| r.fields().iter()),
            self.tolerance,
        );
        let composite_score = self.scorer.score(&resolution.metrics);

        // Finalize
        let mut warnings: Vec<ProviderWarning> =
            results.iter().flat_map(|r| result_warnings(r)).collect();
        warnings.extend(resolution.conflicts);
        warnings.sort_by(|a, b| {
            a.provider
                .id()
                .cmp(b.provider.id())
                .then(a.metric.cmp(&b.metric))
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.message.cmp(&b.message))
        });

        let providers: Vec<ProviderOutcome> = results
            .iter()
            .map(|r| ProviderOutcome {
                provider: r.provider(),
                status: r.status(),
                field_count: r.fields().len(),
            })
            .collect();
        let partial = results.iter().any(|r| !r.is_success());

        info!(
            "Aggregated {}: {} metric(s) from {} provider(s), partial={}, score={:?}",
            company,
            resolution.metrics.len(),
            providers.len(),
            partial,
            composite_score.as_ref().map(|s| s.value)
        );

        Ok(AggregatedProfile {
            company: company.clone(),
            metrics: resolution.metrics,
            composite_score,
            partial,
            warnings,
            providers,
        })
    }

    /// Remaining quota and next reset of one provider's limiter.
    ///
    /// # Errors
    ///
    /// Returns [`IntelError::UnknownProvider`] if no connector is configured for it.
    pub fn health(&self, provider: ProviderKind) -> Result<ProviderHealth, IntelError> {
        if !self.connectors.iter().any(|c| c.kind() == provider) {
            return Err(IntelError::UnknownProvider(provider));
        }
        self.limiters.health(provider)
    }

    /// Health of every configured provider.
    pub fn health_all(&self) -> Vec<ProviderHealth> {
        self.connectors
            .iter()
            .filter_map(|c| self.health(c.kind()).ok())
            .collect()
    }
}

/// Warnings one provider result contributes to a profile.
fn result_warnings(result: &ProviderResult) -> Vec<ProviderWarning> {
    let provider = result.provider();
    match result.outcome() {
        Outcome::Success { notes, .. } => notes
            .iter()
            .map(|note| ProviderWarning {
                provider,
                kind: WarningKind::ParseAmbiguous,
                metric: note_metric(note),
                message: note.clone(),
            })
            .collect(),
        Outcome::Failure { class, message } => vec![ProviderWarning {
            provider,
            kind: WarningKind::from(*class),
            metric: None,
            message: message.clone(),
        }],
        Outcome::RateLimited { retry_after } => vec![ProviderWarning {
            provider,
            kind: WarningKind::ProviderRateLimited,
            metric: None,
            message: match retry_after {
                Some(wait) => format!("rate limited, retry after {}s", wait.as_secs()),
                None => "rate limited".to_string(),
            },
        }],
    }
}

/// Parse notes are written as `"<metric>: <reason>"`.
fn note_metric(note: &str) -> Option<Metric> {
    let (name, _) = note.split_once(':')?;
    Metric::ALL.iter().copied().find(|m| m.as_str() == name)
}
