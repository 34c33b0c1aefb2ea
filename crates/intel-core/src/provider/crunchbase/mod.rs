//! Crunchbase funding-history connector.
//!
//! Reads the organization entity with its `raised_funding_rounds` card.
//! Funding momentum is the share of total funding raised in the last
//! 24 months.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::errors::ProviderError;
use crate::models::{CompanyKey, FieldSink, Metric, MetricSet, ProviderKind, ProviderResult};
use crate::parse::{parse_json, ParseOutcome, ParsedNumber};
use crate::provider::{finish, org_slug, Connector, ConnectorCapabilities, HttpFetcher};
use crate::registry::RateLimiter;

const PROVIDER: ProviderKind = ProviderKind::Crunchbase;
const MOMENTUM_WINDOW_DAYS: i64 = 730;

const METRICS: &[Metric] = &[
    Metric::TotalFunding,
    Metric::FundingRounds,
    Metric::FundingMomentum,
];

#[derive(Debug, Deserialize)]
struct EntityResponse {
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    cards: Cards,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    funding_total: Option<Money>,
    num_funding_rounds: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Cards {
    #[serde(default)]
    raised_funding_rounds: Vec<FundingRound>,
}

#[derive(Debug, Deserialize)]
struct FundingRound {
    announced_on: Option<NaiveDate>,
    money_raised: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct Money {
    value_usd: Option<Value>,
}

impl Money {
    fn usd(&self) -> ParseOutcome {
        self.value_usd
            .as_ref()
            .map_or(ParseOutcome::Absent, parse_json)
    }
}

/// Crunchbase connector.
pub struct CrunchbaseConnector {
    http: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
    confidence: f64,
}

impl CrunchbaseConnector {
    pub fn new(settings: &ProviderSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: HttpFetcher::new(PROVIDER, limiter, settings.retry, None),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.credential.clone(),
            confidence: settings.confidence,
        }
    }

    async fn collect(&self, company: &CompanyKey) -> Result<FieldSink, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_input(PROVIDER, "API key not configured"))?;

        let url = format!(
            "{}/entities/organizations/{}",
            self.base_url,
            urlencoding::encode(&org_slug(company))
        );
        let params = [
            ("field_ids", "funding_total,num_funding_rounds"),
            ("card_ids", "raised_funding_rounds"),
        ];
        let entity: EntityResponse = self
            .http
            .get_json(&url, &params, &[("X-cb-user-key", api_key)])
            .await?;

        let fetched_at = Utc::now();
        let mut sink = FieldSink::new(PROVIDER, fetched_at, self.confidence);

        let total = entity
            .properties
            .funding_total
            .as_ref()
            .map_or(ParseOutcome::Absent, Money::usd);
        let total_usd = total.value();
        sink.parsed(Metric::TotalFunding, total);
        if let Some(rounds) = &entity.properties.num_funding_rounds {
            sink.parsed(Metric::FundingRounds, parse_json(rounds));
        }
        if let Some(total) = total_usd {
            sink.parsed(
                Metric::FundingMomentum,
                momentum(&entity.cards.raised_funding_rounds, total, fetched_at),
            );
        }
        Ok(sink)
    }
}

/// Share of `total` raised within the momentum window before `now`.
///
/// Ambiguous when a recent round's amount cannot be read.
fn momentum(rounds: &[FundingRound], total: f64, now: DateTime<Utc>) -> ParseOutcome {
    if total <= 0.0 {
        return ParseOutcome::Absent;
    }
    let cutoff = (now - Duration::days(MOMENTUM_WINDOW_DAYS)).date_naive();
    let mut recent = 0.0;
    for round in rounds {
        let Some(announced) = round.announced_on.filter(|d| *d >= cutoff) else {
            continue;
        };
        match round.money_raised.as_ref().map_or(ParseOutcome::Absent, Money::usd) {
            ParseOutcome::Value(n) => recent += n.value,
            ParseOutcome::Absent => {}
            ParseOutcome::Ambiguous(reason) => {
                return ParseOutcome::Ambiguous(format!("round announced {}: {}", announced, reason))
            }
        }
    }
    ParseOutcome::Value(ParsedNumber {
        value: (recent / total).clamp(0.0, 1.0),
        unit_hint: None,
    })
}

#[async_trait]
impl Connector for CrunchbaseConnector {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities {
            metrics: METRICS,
            requires_credential: true,
        }
    }

    async fn fetch(&self, company: &CompanyKey, metrics: &MetricSet) -> ProviderResult {
        let outcome = self.collect(company).await;
        finish(PROVIDER, company, metrics, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RetryPolicy;
    use crate::models::{FailureClass, Outcome};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector(server: &MockServer) -> CrunchbaseConnector {
        let mut settings = ProviderSettings::defaults_for(PROVIDER);
        settings.base_url = server.uri();
        settings.credential = Some("cb-key".to_string());
        settings.retry = RetryPolicy::none();
        CrunchbaseConnector::new(&settings, Arc::new(RateLimiter::unlimited(PROVIDER)))
    }

    fn number(result: &ProviderResult, metric: Metric) -> Option<f64> {
        result
            .fields()
            .iter()
            .find(|f| f.metric == metric)
            .and_then(|f| f.value.as_number())
    }

    #[tokio::test]
    async fn test_funding_fields_and_momentum() {
        let recent = (Utc::now() - Duration::days(100)).date_naive().to_string();
        let old = (Utc::now() - Duration::days(2000)).date_naive().to_string();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entities/organizations/stripe"))
            .and(header("X-cb-user-key", "cb-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {
                    "funding_total": { "value": 1000, "currency": "USD", "value_usd": 1000 },
                    "num_funding_rounds": 3
                },
                "cards": {
                    "raised_funding_rounds": [
                        { "announced_on": recent, "money_raised": { "value_usd": 250 } },
                        { "announced_on": old, "money_raised": { "value_usd": 700 } },
                        { "announced_on": old, "money_raised": null }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let company = CompanyKey::new("STRIPE").unwrap().with_name("Stripe, Inc.");
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;

        assert!(result.is_success());
        assert_eq!(number(&result, Metric::TotalFunding), Some(1000.0));
        assert_eq!(number(&result, Metric::FundingRounds), Some(3.0));
        assert_eq!(number(&result, Metric::FundingMomentum), Some(0.25));
    }

    #[tokio::test]
    async fn test_unknown_organization_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let company = CompanyKey::new("NOPE").unwrap();
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;
        assert!(matches!(
            result.outcome(),
            Outcome::Failure {
                class: FailureClass::Permanent,
                ..
            }
        ));
    }

    #[test]
    fn test_momentum_needs_positive_total() {
        assert_eq!(momentum(&[], 0.0, Utc::now()), ParseOutcome::Absent);
        assert_eq!(momentum(&[], 10.0, Utc::now()).value(), Some(0.0));
    }

    #[tokio::test]
    async fn test_unreadable_amounts_become_notes() {
        let recent = (Utc::now() - Duration::days(30)).date_naive().to_string();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entities/organizations/stripe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {
                    "funding_total": { "value": 1000, "currency": "USD", "value_usd": 1000 },
                    "num_funding_rounds": 2
                },
                "cards": {
                    "raised_funding_rounds": [
                        { "announced_on": recent, "money_raised": { "value_usd": true } }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let company = CompanyKey::new("STRIPE").unwrap().with_name("Stripe, Inc.");
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;

        assert_eq!(number(&result, Metric::TotalFunding), Some(1000.0));
        assert_eq!(number(&result, Metric::FundingMomentum), None);
        assert_eq!(result.notes().len(), 1);
        assert!(result.notes()[0].starts_with("funding_momentum: round announced"));
    }

    #[tokio::test]
    async fn test_unreadable_funding_total_is_noted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entities/organizations/stripe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {
                    "funding_total": { "value_usd": { "amount": 1000 } },
                    "num_funding_rounds": 2
                }
            })))
            .mount(&server)
            .await;

        let company = CompanyKey::new("STRIPE").unwrap().with_name("Stripe, Inc.");
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;

        assert!(result.is_success());
        assert_eq!(number(&result, Metric::TotalFunding), None);
        assert_eq!(number(&result, Metric::FundingMomentum), None);
        assert_eq!(number(&result, Metric::FundingRounds), Some(2.0));
        assert_eq!(
            result.notes().to_vec(),
            vec!["total_funding: structured value where a number was expected".to_string()]
        );
    }
}
