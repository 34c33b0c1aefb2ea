//! SEC EDGAR regulatory filings connector.
//!
//! Reads XBRL company facts from `data.sec.gov` and keeps the latest annual
//! (10-K, full fiscal year) values. Tickers are resolved to CIKs through the
//! SEC's `company_tickers.json` file when the company key carries no CIK.
//!
//! The SEC requires a descriptive User-Agent and allows 10 requests per second.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::ProviderSettings;
use crate::errors::ProviderError;
use crate::models::{CompanyKey, FieldSink, Metric, MetricSet, ProviderKind, ProviderResult};
use crate::parse::{parse_json, ParseOutcome};
use crate::provider::{finish, Connector, ConnectorCapabilities, HttpFetcher};
use crate::registry::RateLimiter;

const PROVIDER: ProviderKind = ProviderKind::SecEdgar;

const METRICS: &[Metric] = &[
    Metric::Revenue,
    Metric::RevenueGrowth,
    Metric::NetIncome,
    Metric::TotalAssets,
    Metric::SharesOutstanding,
];

/// Revenue has been reported under several us-gaap concepts over the years.
const REVENUE_CONCEPTS: &[&str] = &[
    "RevenueFromContractWithCustomerExcludingAssessedTax",
    "Revenues",
    "SalesRevenueNet",
];

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

#[derive(Debug, Deserialize)]
struct CompanyFacts {
    #[serde(default)]
    facts: HashMap<String, HashMap<String, Concept>>,
}

#[derive(Debug, Deserialize)]
struct Concept {
    #[serde(default)]
    units: HashMap<String, Vec<FactEntry>>,
}

#[derive(Debug, Deserialize)]
struct FactEntry {
    start: Option<NaiveDate>,
    end: NaiveDate,
    val: Value,
    fp: Option<String>,
    form: Option<String>,
    filed: Option<NaiveDate>,
}

impl FactEntry {
    fn is_annual(&self) -> bool {
        let annual_form = self
            .form
            .as_deref()
            .map(|f| f.starts_with("10-K"))
            .unwrap_or(false);
        let full_year = self.fp.as_deref() == Some("FY");
        // Duration facts in a 10-K also include quarters; keep ~12 month spans only.
        let year_span = match self.start {
            Some(start) => (350..=380).contains(&(self.end - start).num_days()),
            None => true,
        };
        annual_form && full_year && year_span
    }
}

/// One annual observation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AnnualValue {
    end: NaiveDate,
    value: f64,
}

/// SEC EDGAR connector.
pub struct SecEdgarConnector {
    http: HttpFetcher,
    base_url: String,
    lookup_url: Option<String>,
    confidence: f64,
    /// Upper-case ticker to unpadded CIK. Loaded once on first use.
    ciks: OnceCell<HashMap<String, String>>,
}

impl SecEdgarConnector {
    pub fn new(settings: &ProviderSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: HttpFetcher::new(
                PROVIDER,
                limiter,
                settings.retry,
                settings.user_agent.as_deref(),
            ),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            lookup_url: settings.lookup_url.clone(),
            confidence: settings.confidence,
            ciks: OnceCell::new(),
        }
    }

    async fn resolve_cik(&self, company: &CompanyKey) -> Result<String, ProviderError> {
        if let Some(cik) = company.cik() {
            return Ok(cik.to_string());
        }

        let url = self.lookup_url.as_deref().ok_or_else(|| {
            ProviderError::missing_input(PROVIDER, "no CIK and no ticker lookup configured")
        })?;
        let ciks = self
            .ciks
            .get_or_try_init(|| async {
                let entries: HashMap<String, TickerEntry> =
                    self.http.get_json(url, &[], &[]).await?;
                debug!("Loaded {} SEC ticker mappings", entries.len());
                Ok::<_, ProviderError>(
                    entries
                        .into_values()
                        .map(|e| (e.ticker.to_uppercase(), e.cik_str.to_string()))
                        .collect(),
                )
            })
            .await?;

        ciks.get(company.ticker()).cloned().ok_or_else(|| {
            ProviderError::not_found(PROVIDER, format!("no CIK for ticker {}", company.ticker()))
        })
    }

    async fn collect(&self, company: &CompanyKey) -> Result<FieldSink, ProviderError> {
        let cik = self.resolve_cik(company).await?;
        let url = format!(
            "{}/api/xbrl/companyfacts/CIK{:0>10}.json",
            self.base_url, cik
        );
        let facts: CompanyFacts = self.http.get_json(&url, &[], &[]).await?;
        Ok(self.map_facts(&facts))
    }

    fn map_facts(&self, facts: &CompanyFacts) -> FieldSink {
        let mut sink = FieldSink::new(PROVIDER, Utc::now(), self.confidence);
        let gaap = facts.facts.get("us-gaap");
        let concept = |name: &str| gaap.and_then(|g| g.get(name));
        let mut ambiguous = Vec::new();

        let revenue = REVENUE_CONCEPTS
            .iter()
            .filter_map(|name| concept(*name))
            .map(|c| annual_values(c, "USD", &mut ambiguous))
            .filter(|values| !values.is_empty())
            .max_by_key(|values| values[0].end)
            .unwrap_or_default();
        note_all(&mut sink, Metric::Revenue, &mut ambiguous);
        sink.number(Metric::Revenue, revenue.first().map(|v| v.value));
        sink.number(Metric::RevenueGrowth, year_over_year(&revenue));

        for (metric, name) in [
            (Metric::NetIncome, "NetIncomeLoss"),
            (Metric::TotalAssets, "Assets"),
        ] {
            let latest = concept(name)
                .map(|c| annual_values(c, "USD", &mut ambiguous))
                .and_then(|values| values.first().map(|v| v.value));
            note_all(&mut sink, metric, &mut ambiguous);
            sink.number(metric, latest);
        }

        let shares = facts
            .facts
            .get("dei")
            .and_then(|d| d.get("EntityCommonStockSharesOutstanding"))
            .or_else(|| concept("CommonStockSharesOutstanding"))
            .and_then(|c| latest_value(c, "shares", &mut ambiguous));
        note_all(&mut sink, Metric::SharesOutstanding, &mut ambiguous);
        sink.number(Metric::SharesOutstanding, shares);

        sink
    }
}

fn note_all(sink: &mut FieldSink, metric: Metric, ambiguous: &mut Vec<String>) {
    for reason in ambiguous.drain(..) {
        sink.note(metric, reason);
    }
}

/// Numeric value of one fact; uninterpretable values are pushed to `ambiguous`.
fn fact_value(entry: &FactEntry, ambiguous: &mut Vec<String>) -> Option<f64> {
    match parse_json(&entry.val) {
        ParseOutcome::Value(n) => Some(n.value),
        ParseOutcome::Absent => None,
        ParseOutcome::Ambiguous(reason) => {
            ambiguous.push(format!("{} (period ending {})", reason, entry.end));
            None
        }
    }
}

/// Annual values for `unit`, newest first, one per period end (latest filing wins).
fn annual_values(concept: &Concept, unit: &str, ambiguous: &mut Vec<String>) -> Vec<AnnualValue> {
    let mut by_end: HashMap<NaiveDate, (Option<NaiveDate>, f64)> = HashMap::new();
    for entry in concept.units.get(unit).into_iter().flatten() {
        if !entry.is_annual() {
            continue;
        }
        let Some(value) = fact_value(entry, ambiguous) else {
            continue;
        };
        let newer = by_end
            .get(&entry.end)
            .map_or(true, |(filed, _)| entry.filed > *filed);
        if newer {
            by_end.insert(entry.end, (entry.filed, value));
        }
    }

    let mut values: Vec<AnnualValue> = by_end
        .into_iter()
        .map(|(end, (_, value))| AnnualValue { end, value })
        .collect();
    values.sort_by(|a, b| b.end.cmp(&a.end));
    values
}

/// Most recent value for `unit` regardless of form.
fn latest_value(concept: &Concept, unit: &str, ambiguous: &mut Vec<String>) -> Option<f64> {
    concept
        .units
        .get(unit)?
        .iter()
        .filter_map(|e| fact_value(e, ambiguous).map(|v| (e.end, e.filed, v)))
        .max_by_key(|(end, filed, _)| (*end, *filed))
        .map(|(_, _, v)| v)
}

/// Growth between the two newest annual values when they are a year apart.
fn year_over_year(values: &[AnnualValue]) -> Option<f64> {
    let (current, previous) = (values.first()?, values.get(1)?);
    let gap = (current.end - previous.end).num_days();
    if !(330..=400).contains(&gap) || previous.value == 0.0 {
        return None;
    }
    Some((current.value - previous.value) / previous.value.abs())
}

#[async_trait]
impl Connector for SecEdgarConnector {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities {
            metrics: METRICS,
            requires_credential: false,
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

    fn connector(server: &MockServer) -> SecEdgarConnector {
        let mut settings = ProviderSettings::defaults_for(PROVIDER);
        settings.base_url = server.uri();
        settings.lookup_url = Some(format!("{}/files/company_tickers.json", server.uri()));
        settings.user_agent = Some("signal-intel-tests admin@example.com".to_string());
        settings.retry = RetryPolicy::none();
        SecEdgarConnector::new(&settings, Arc::new(RateLimiter::unlimited(PROVIDER)))
    }

    fn facts_body() -> Value {
        json!({
            "cik": 320193,
            "entityName": "Apple Inc.",
            "facts": {
                "dei": {
                    "EntityCommonStockSharesOutstanding": {
                        "units": { "shares": [
                            { "end": "2023-10-20", "val": 15552752000_i64, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03" },
                            { "end": "2024-01-19", "val": 15441881000_i64, "fy": 2024, "fp": "Q1", "form": "10-Q", "filed": "2024-02-02" }
                        ]}
                    }
                },
                "us-gaap": {
                    "RevenueFromContractWithCustomerExcludingAssessedTax": {
                        "units": { "USD": [
                            { "start": "2021-09-26", "end": "2022-09-24", "val": 394328000000_i64, "fy": 2022, "fp": "FY", "form": "10-K", "filed": "2022-10-28" },
                            { "start": "2021-09-26", "end": "2022-09-24", "val": 394328000000_i64, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03" },
                            { "start": "2022-09-25", "end": "2023-09-30", "val": 383285000000_i64, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03" },
                            { "start": "2023-07-02", "end": "2023-09-30", "val": 89498000000_i64, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03" },
                            { "start": "2023-10-01", "end": "2023-12-30", "val": 119575000000_i64, "fy": 2024, "fp": "Q1", "form": "10-Q", "filed": "2024-02-02" }
                        ]}
                    },
                    "Revenues": {
                        "units": { "USD": [
                            { "start": "2008-09-28", "end": "2009-09-26", "val": 42905000000_i64, "fy": 2009, "fp": "FY", "form": "10-K", "filed": "2009-10-27" }
                        ]}
                    },
                    "NetIncomeLoss": {
                        "units": { "USD": [
                            { "start": "2022-09-25", "end": "2023-09-30", "val": 96995000000_i64, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03" }
                        ]}
                    },
                    "Assets": {
                        "units": { "USD": [
                            { "end": "2022-09-24", "val": 352755000000_i64, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03" },
                            { "end": "2023-09-30", "val": 352583000000_i64, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03" }
                        ]}
                    }
                }
            }
        })
    }

    fn number(result: &ProviderResult, metric: Metric) -> Option<f64> {
        result
            .fields()
            .iter()
            .find(|f| f.metric == metric)
            .and_then(|f| f.value.as_number())
    }

    #[tokio::test]
    async fn test_resolves_cik_and_maps_annual_facts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/company_tickers.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "0": { "cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc." },
                "1": { "cik_str": 789019, "ticker": "MSFT", "title": "MICROSOFT CORP" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/xbrl/companyfacts/CIK0000320193.json"))
            .and(header("User-Agent", "signal-intel-tests admin@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(facts_body()))
            .mount(&server)
            .await;

        let connector = connector(&server);
        let company = CompanyKey::new("AAPL").unwrap();
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector.fetch(&company, &metrics).await;

        assert!(result.is_success());
        assert_eq!(number(&result, Metric::Revenue), Some(383285000000.0));
        let growth = number(&result, Metric::RevenueGrowth).unwrap();
        assert!((growth - (383285.0 - 394328.0) / 394328.0).abs() < 1e-9);
        assert_eq!(number(&result, Metric::NetIncome), Some(96995000000.0));
        assert_eq!(number(&result, Metric::TotalAssets), Some(352583000000.0));
        assert_eq!(number(&result, Metric::SharesOutstanding), Some(15441881000.0));
        assert!(result.fields().iter().all(|f| f.confidence == 0.95));

        // ticker map is loaded once
        let again = connector.fetch(&company, &metrics).await;
        assert!(again.is_success());
    }

    #[tokio::test]
    async fn test_known_cik_skips_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/company_tickers.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/xbrl/companyfacts/CIK0000320193.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(facts_body()))
            .mount(&server)
            .await;

        let company = CompanyKey::new("AAPL").unwrap().with_cik("0000320193").unwrap();
        let metrics: MetricSet = [Metric::NetIncome].into_iter().collect();
        let result = connector(&server).fetch(&company, &metrics).await;
        assert_eq!(result.fields().len(), 1);
    }

    #[tokio::test]
    async fn test_uninterpretable_fact_becomes_note() {
        let server = MockServer::start().await;
        let mut body = facts_body();
        body["facts"]["us-gaap"]["NetIncomeLoss"]["units"]["USD"][0]["val"] =
            json!({ "amount": 96995000000_i64 });
        Mock::given(method("GET"))
            .and(path("/api/xbrl/companyfacts/CIK0000320193.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let company = CompanyKey::new("AAPL").unwrap().with_cik("320193").unwrap();
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;

        assert!(result.is_success());
        assert_eq!(number(&result, Metric::NetIncome), None);
        assert_eq!(number(&result, Metric::Revenue), Some(383285000000.0));
        assert_eq!(result.notes().len(), 1);
        assert!(result.notes()[0].starts_with("net_income: structured value"));
        assert!(result.notes()[0].contains("2023-09-30"));
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/company_tickers.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "0": { "cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc." }
            })))
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
    fn test_year_over_year_requires_adjacent_years() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let values = [
            AnnualValue { end: d("2023-12-31"), value: 110.0 },
            AnnualValue { end: d("2022-12-31"), value: 100.0 },
        ];
        assert!((year_over_year(&values).unwrap() - 0.1).abs() < 1e-12);

        let gapped = [
            AnnualValue { end: d("2023-12-31"), value: 110.0 },
            AnnualValue { end: d("2020-12-31"), value: 100.0 },
        ];
        assert_eq!(year_over_year(&gapped), None);
        assert_eq!(year_over_year(&values[..1]), None);
    }
}
