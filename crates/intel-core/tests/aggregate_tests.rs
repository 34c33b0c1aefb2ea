//! End-to-end tests for `Aggregator::aggregate` against mock connectors.
//!
//! Timing-sensitive tests run on a paused tokio clock so provider timeouts
//! and call deadlines elapse instantly and deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use signal_intel_core::{
    Aggregator, CacheKey, CompanyKey, Connector, ConnectorCapabilities, FailureClass, IntelConfig,
    IntelError, Metric, MetricSet, ProviderField, ProviderKind, ProviderResult, RateLimit,
    RateLimiterRegistry, ResolutionMethod, ResultCache, WarningKind,
};

// =============================================================================
// Mock connector
// =============================================================================

#[derive(Clone)]
enum Behavior {
    Fields(Vec<(Metric, f64)>),
    Hang,
    Fail(FailureClass),
    RateLimited,
}

struct MockConnector {
    kind: ProviderKind,
    metrics: &'static [Metric],
    confidence: f64,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl MockConnector {
    fn new(kind: ProviderKind, metrics: &'static [Metric], behavior: Behavior) -> Self {
        Self {
            kind,
            metrics,
            confidence: 0.8,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities {
            metrics: self.metrics,
            requires_credential: false,
        }
    }

    async fn fetch(&self, _company: &CompanyKey, metrics: &MetricSet) -> ProviderResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Simulated network latency
        tokio::time::sleep(Duration::from_millis(50)).await;

        match &self.behavior {
            Behavior::Fields(values) => {
                let fields = values
                    .iter()
                    .filter(|(metric, _)| metrics.contains(metric))
                    .map(|(metric, value)| {
                        ProviderField::number(*metric, *value, self.kind, Utc::now(), self.confidence)
                    })
                    .collect();
                ProviderResult::success(self.kind, fields, Vec::new())
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                ProviderResult::failure(self.kind, FailureClass::Transient, "unreachable")
            }
            Behavior::Fail(class) => ProviderResult::failure(self.kind, *class, "mock failure"),
            Behavior::RateLimited => {
                ProviderResult::rate_limited(self.kind, Some(Duration::from_secs(60)))
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn aggregator(connectors: Vec<MockConnector>) -> (Aggregator, Vec<Arc<AtomicUsize>>) {
    aggregator_with(connectors, RateLimiterRegistry::new())
}

fn aggregator_with(
    connectors: Vec<MockConnector>,
    limiters: RateLimiterRegistry,
) -> (Aggregator, Vec<Arc<AtomicUsize>>) {
    let config = IntelConfig::default();
    let calls = connectors.iter().map(|c| Arc::clone(&c.calls)).collect();
    let connectors: Vec<Arc<dyn Connector>> = connectors
        .into_iter()
        .map(|c| Arc::new(c) as Arc<dyn Connector>)
        .collect();
    let aggregator = Aggregator::new(
        connectors,
        limiters,
        ResultCache::from_config(&config),
        &config,
    );
    (aggregator, calls)
}

fn metric_set(metrics: &[Metric]) -> MetricSet {
    metrics.iter().copied().collect()
}

fn apple() -> CompanyKey {
    CompanyKey::new("aapl").unwrap().with_name("Apple Inc.")
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_one_provider_times_out_three_succeed() {
    let (aggregator, _) = aggregator(vec![
        MockConnector::new(
            ProviderKind::SecEdgar,
            &[Metric::RevenueGrowth],
            Behavior::Fields(vec![(Metric::RevenueGrowth, 0.2)]),
        ),
        MockConnector::new(
            ProviderKind::Finnhub,
            &[Metric::MarketCap],
            Behavior::Fields(vec![(Metric::MarketCap, 2.0e12)]),
        ),
        MockConnector::new(
            ProviderKind::GitHub,
            &[Metric::CodeMomentum],
            Behavior::Fields(vec![(Metric::CodeMomentum, 0.6)]),
        ),
        MockConnector::new(ProviderKind::NewsApi, &[Metric::SentimentPolarity], Behavior::Hang),
    ]);
    let metrics = metric_set(&[
        Metric::RevenueGrowth,
        Metric::MarketCap,
        Metric::CodeMomentum,
        Metric::SentimentPolarity,
    ]);

    let deadline = Duration::from_secs(30);
    let started = tokio::time::Instant::now();
    let profile = aggregator
        .aggregate(&apple(), &metrics, Some(deadline))
        .await
        .unwrap();
    assert!(started.elapsed() < deadline);

    assert!(profile.partial);
    assert_eq!(profile.warnings.len(), 1);
    let warning = &profile.warnings[0];
    assert_eq!(warning.provider, ProviderKind::NewsApi);
    assert_eq!(warning.kind, WarningKind::ProviderTimeout);

    assert_eq!(profile.metrics.len(), 3);
    assert!(profile.metric(Metric::SentimentPolarity).is_none());

    let score = profile.composite_score.as_ref().unwrap();
    assert_eq!(score.components.len(), 3);
    assert!(score
        .components
        .iter()
        .all(|c| c.metric != Metric::SentimentPolarity));
    let weights: f64 = score.components.iter().map(|c| c.weight).sum();
    assert!((weights - 1.0).abs() < 1e-9);
    assert!(score.value > 0.0 && score.value <= 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_abandons_slow_provider_without_caching() {
    let (aggregator, _) = aggregator(vec![
        MockConnector::new(
            ProviderKind::Finnhub,
            &[Metric::SharePrice],
            Behavior::Fields(vec![(Metric::SharePrice, 190.0)]),
        ),
        MockConnector::new(ProviderKind::SecEdgar, &[Metric::Revenue], Behavior::Hang),
    ]);
    let metrics = metric_set(&[Metric::SharePrice, Metric::Revenue]);

    let started = tokio::time::Instant::now();
    let profile = aggregator
        .aggregate(&apple(), &metrics, Some(Duration::from_secs(2)))
        .await
        .unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));

    assert!(profile.partial);
    let sec: Vec<_> = profile.warnings_for(ProviderKind::SecEdgar).collect();
    assert_eq!(sec.len(), 1);
    assert_eq!(sec[0].kind, WarningKind::ProviderTimeout);
    assert!(profile.metric(Metric::SharePrice).is_some());

    // A deadline cut is a property of this call, not of the provider.
    let key = CacheKey::new(ProviderKind::SecEdgar, apple(), metric_set(&[Metric::Revenue]));
    assert!(aggregator.cache().get(&key).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_calls_are_bit_identical() {
    let (aggregator, calls) = aggregator(vec![
        MockConnector::new(
            ProviderKind::SecEdgar,
            &[Metric::Revenue, Metric::RevenueGrowth],
            Behavior::Fields(vec![(Metric::Revenue, 100.0), (Metric::RevenueGrowth, 0.08)]),
        )
        .with_confidence(0.95),
        MockConnector::new(
            ProviderKind::AlphaVantage,
            &[Metric::Revenue, Metric::MarketCap],
            Behavior::Fields(vec![(Metric::Revenue, 101.0), (Metric::MarketCap, 3.0e12)]),
        ),
        MockConnector::new(
            ProviderKind::Crunchbase,
            &[Metric::FundingMomentum],
            Behavior::Fail(FailureClass::Permanent),
        ),
    ]);
    let metrics = metric_set(&[
        Metric::Revenue,
        Metric::RevenueGrowth,
        Metric::MarketCap,
        Metric::FundingMomentum,
    ]);

    let first = aggregator.aggregate(&apple(), &metrics, None).await.unwrap();
    let second = aggregator.aggregate(&apple(), &metrics, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    for counter in &calls {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    let revenue = first.metric(Metric::Revenue).unwrap();
    assert_eq!(revenue.method, ResolutionMethod::WeightedMean);
    assert_eq!(
        revenue.agreeing,
        vec![ProviderKind::SecEdgar, ProviderKind::AlphaVantage]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disagreement_is_surfaced_not_partial() {
    let (aggregator, _) = aggregator(vec![
        MockConnector::new(
            ProviderKind::SecEdgar,
            &[Metric::Revenue],
            Behavior::Fields(vec![(Metric::Revenue, 100.0)]),
        )
        .with_confidence(0.95),
        MockConnector::new(
            ProviderKind::AlphaVantage,
            &[Metric::Revenue],
            Behavior::Fields(vec![(Metric::Revenue, 140.0)]),
        ),
    ]);

    let profile = aggregator
        .aggregate(&apple(), &metric_set(&[Metric::Revenue]), None)
        .await
        .unwrap();

    assert!(!profile.partial);
    assert!(profile.composite_score.is_none());
    assert_eq!(profile.metric(Metric::Revenue).unwrap().number(), Some(100.0));

    assert_eq!(profile.warnings.len(), 1);
    let note = &profile.warnings[0];
    assert_eq!(note.kind, WarningKind::ConflictUnresolvedNote);
    assert!(note.message.contains("SEC_EDGAR=100"));
    assert!(note.message.contains("ALPHA_VANTAGE=140"));
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_classified_per_provider() {
    let (aggregator, _) = aggregator(vec![
        MockConnector::new(
            ProviderKind::Finnhub,
            &[Metric::SharePrice],
            Behavior::Fields(vec![(Metric::SharePrice, 190.0)]),
        ),
        MockConnector::new(ProviderKind::NewsApi, &[Metric::NewsVolume], Behavior::RateLimited),
        MockConnector::new(
            ProviderKind::GitHub,
            &[Metric::CodeStars],
            Behavior::Fail(FailureClass::Transient),
        ),
    ]);
    let metrics = metric_set(&[Metric::SharePrice, Metric::NewsVolume, Metric::CodeStars]);

    let profile = aggregator.aggregate(&apple(), &metrics, None).await.unwrap();

    assert!(profile.partial);
    let kinds: Vec<_> = profile.warnings.iter().map(|w| (w.provider, w.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (ProviderKind::GitHub, WarningKind::ProviderTransient),
            (ProviderKind::NewsApi, WarningKind::ProviderRateLimited),
        ]
    );
    assert_eq!(profile.providers.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_connectors_are_not_dispatched() {
    let (aggregator, calls) = aggregator(vec![
        MockConnector::new(
            ProviderKind::Finnhub,
            &[Metric::SharePrice],
            Behavior::Fields(vec![(Metric::SharePrice, 190.0)]),
        ),
        MockConnector::new(ProviderKind::GitHub, &[Metric::CodeStars], Behavior::Hang),
    ]);

    let profile = aggregator
        .aggregate(&apple(), &metric_set(&[Metric::SharePrice]), None)
        .await
        .unwrap();

    assert!(!profile.partial);
    assert_eq!(profile.providers.len(), 1);
    assert_eq!(calls[1].load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_aggregations_share_one_fetch() {
    let (aggregator, calls) = aggregator(vec![MockConnector::new(
        ProviderKind::Finnhub,
        &[Metric::SharePrice],
        Behavior::Fields(vec![(Metric::SharePrice, 190.0)]),
    )]);
    let aggregator = Arc::new(aggregator);
    let metrics = metric_set(&[Metric::SharePrice]);

    let runs = (0..8).map(|_| {
        let aggregator = Arc::clone(&aggregator);
        let metrics = metrics.clone();
        async move { aggregator.aggregate(&apple(), &metrics, None).await }
    });
    let profiles = futures::future::join_all(runs).await;

    assert_eq!(calls[0].load(Ordering::SeqCst), 1);
    let first = profiles[0].as_ref().unwrap();
    for profile in &profiles {
        assert_eq!(profile.as_ref().unwrap(), first);
    }
}

#[tokio::test]
async fn test_empty_metric_set_is_rejected() {
    let (aggregator, _) = aggregator(Vec::new());
    let result = aggregator.aggregate(&apple(), &MetricSet::new(), None).await;
    assert!(matches!(result, Err(IntelError::EmptyMetricSet)));
}

#[test]
fn test_malformed_company_key_is_rejected() {
    assert!(matches!(
        CompanyKey::new("  "),
        Err(IntelError::InvalidCompanyKey(_))
    ));
    assert!(matches!(
        CompanyKey::new("AAPL").unwrap().with_cik("12ab"),
        Err(IntelError::InvalidCompanyKey(_))
    ));
}

#[tokio::test]
async fn test_company_key_from_json_is_validated_before_dispatch() {
    assert!(serde_json::from_str::<CompanyKey>(r#"{"ticker":""}"#).is_err());
    assert!(serde_json::from_str::<CompanyKey>(r#"{"ticker":"AAPL","cik":"12ab"}"#).is_err());

    let (aggregator, calls) = aggregator(vec![MockConnector::new(
        ProviderKind::Finnhub,
        &[Metric::MarketCap],
        Behavior::Fields(vec![(Metric::MarketCap, 3.0e12)]),
    )]);
    let company: CompanyKey = serde_json::from_str(r#"{"ticker":"aapl"}"#).unwrap();
    let profile = aggregator
        .aggregate(&company, &metric_set(&[Metric::MarketCap]), None)
        .await
        .unwrap();
    assert_eq!(profile.company.ticker(), "AAPL");
    assert_eq!(calls[0].load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_health_reports_configured_providers_only() {
    let limiters = RateLimiterRegistry::from_limits([(ProviderKind::Finnhub, RateLimit::per_minute(60))]);
    let finnhub = limiters.get(ProviderKind::Finnhub).unwrap();
    assert!(finnhub.try_acquire());

    let (aggregator, _) = aggregator_with(
        vec![MockConnector::new(
            ProviderKind::Finnhub,
            &[Metric::SharePrice],
            Behavior::Fields(vec![(Metric::SharePrice, 190.0)]),
        )],
        limiters,
    );

    let health = aggregator.health(ProviderKind::Finnhub).unwrap();
    assert_eq!(health.remaining_quota, Some(59));
    assert!(health.next_reset.is_some());

    assert!(matches!(
        aggregator.health(ProviderKind::GitHub),
        Err(IntelError::UnknownProvider(ProviderKind::GitHub))
    ));
    assert_eq!(aggregator.health_all().len(), 1);
}
