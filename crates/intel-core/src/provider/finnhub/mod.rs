//! Finnhub quote connector.
//!
//! This module reads three Finnhub endpoints, calling only those the
//! requested metrics need:
//! - `/quote` for the current share price
//! - `/stock/profile2` for market cap, shares outstanding, headcount and industry
//! - `/stock/metric?metric=all` for P/E, dividend yield and revenue growth
//!
//! A failing sub-endpoint does not fail the call if another one produced fields.
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderSettings;
use crate::errors::{ErrorClass, ProviderError};
use crate::models::{CompanyKey, FieldSink, Metric, MetricSet, ProviderKind, ProviderResult};
use crate::parse::{parse_json, ParseOutcome};
use crate::provider::{finish, Connector, ConnectorCapabilities, HttpFetcher};
use crate::registry::RateLimiter;

const PROVIDER: ProviderKind = ProviderKind::Finnhub;

const METRICS: &[Metric] = &[
    Metric::SharePrice,
    Metric::MarketCap,
    Metric::SharesOutstanding,
    Metric::Employees,
    Metric::Sector,
    Metric::PeRatio,
    Metric::DividendYield,
    Metric::RevenueGrowth,
];

const QUOTE_METRICS: &[Metric] = &[Metric::SharePrice];
const PROFILE_METRICS: &[Metric] = &[
    Metric::MarketCap,
    Metric::SharesOutstanding,
    Metric::Employees,
    Metric::Sector,
];
const RATIO_METRICS: &[Metric] = &[Metric::PeRatio, Metric::DividendYield, Metric::RevenueGrowth];

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<Value>,
    /// Open price of the day
    o: Option<Value>,
}

/// Response from /stock/profile2 endpoint. Unknown symbols return `{}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    /// Finnhub industry classification
    finnhub_industry: Option<String>,
    /// Market capitalization (in millions)
    market_capitalization: Option<Value>,
    /// Shares outstanding (in millions)
    share_outstanding: Option<Value>,
    employee_total: Option<Value>,
}

/// Response from /stock/metric endpoint
#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: serde_json::Map<String, Value>,
}

// ============================================================================
// FinnhubConnector
// ============================================================================

/// Finnhub connector.
pub struct FinnhubConnector {
    http: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
    confidence: f64,
}

impl FinnhubConnector {
    pub fn new(settings: &ProviderSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: HttpFetcher::new(PROVIDER, limiter, settings.retry, None),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.credential.clone(),
            confidence: settings.confidence,
        }
    }

    /// Make a GET request to the Finnhub API.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let token = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_input(PROVIDER, "API key not configured"))?;
        let url = format!("{}{}", self.base_url, endpoint);
        // API key as header, not query param
        self.http
            .get_json(&url, params, &[("X-Finnhub-Token", token)])
            .await
    }

    async fn read_quote(&self, symbol: &str, sink: &mut FieldSink) -> Result<(), ProviderError> {
        let quote: QuoteResponse = self.get("/quote", &[("symbol", symbol)]).await?;

        let close = quote.c.as_ref().map_or(ParseOutcome::Absent, parse_json);
        if close.value() != Some(0.0) {
            sink.parsed(Metric::SharePrice, close);
            return Ok(());
        }

        // Finnhub returns zeros for unknown symbols instead of an error
        match quote.o.as_ref().map_or(ParseOutcome::Absent, parse_json) {
            ParseOutcome::Ambiguous(reason) => sink.note(
                Metric::SharePrice,
                format!("zero close with unreadable open {}", reason),
            ),
            open if open.value().unwrap_or(0.0) == 0.0 => {
                debug!("Finnhub has no trading data for {}", symbol);
            }
            _ => sink.parsed(Metric::SharePrice, close),
        }
        Ok(())
    }

    async fn read_profile(&self, symbol: &str, sink: &mut FieldSink) -> Result<(), ProviderError> {
        let profile: ProfileResponse = self.get("/stock/profile2", &[("symbol", symbol)]).await?;

        if let Some(v) = &profile.market_capitalization {
            sink.parsed(Metric::MarketCap, parse_json(v).scaled(1e6));
        }
        if let Some(v) = &profile.share_outstanding {
            sink.parsed(Metric::SharesOutstanding, parse_json(v).scaled(1e6));
        }
        if let Some(v) = &profile.employee_total {
            sink.parsed(Metric::Employees, parse_json(v));
        }
        sink.text(Metric::Sector, profile.finnhub_industry.as_deref());
        Ok(())
    }

    async fn read_ratios(&self, symbol: &str, sink: &mut FieldSink) -> Result<(), ProviderError> {
        let response: MetricResponse = self
            .get("/stock/metric", &[("symbol", symbol), ("metric", "all")])
            .await?;
        let metric = &response.metric;

        if let Some(v) = metric.get("peTTM").or_else(|| metric.get("peBasicExclExtraTTM")) {
            sink.parsed(Metric::PeRatio, parse_json(v));
        }
        // Finnhub reports these two in percent points
        if let Some(v) = metric.get("dividendYieldIndicatedAnnual") {
            sink.parsed(Metric::DividendYield, parse_json(v).percent_points());
        }
        if let Some(v) = metric.get("revenueGrowthTTMYoy") {
            sink.parsed(Metric::RevenueGrowth, parse_json(v).percent_points());
        }
        Ok(())
    }

    async fn collect(&self, symbol: &str, metrics: &MetricSet) -> Result<FieldSink, ProviderError> {
        let needs = |group: &[Metric]| group.iter().any(|m| metrics.contains(m));

        let mut sink = FieldSink::new(PROVIDER, Utc::now(), self.confidence);
        let mut first_error: Option<ProviderError> = None;

        for endpoint in 0..3 {
            let step = match endpoint {
                0 if needs(QUOTE_METRICS) => self.read_quote(symbol, &mut sink).await,
                1 if needs(PROFILE_METRICS) => self.read_profile(symbol, &mut sink).await,
                2 if needs(RATIO_METRICS) => self.read_ratios(symbol, &mut sink).await,
                _ => continue,
            };

            if let Err(error) = step {
                warn!("Finnhub sub-request failed for {}: {}", symbol, error);
                let throttled = matches!(error.class(), ErrorClass::RateLimited { .. });
                first_error.get_or_insert(error);
                if throttled {
                    break;
                }
            }
        }

        match first_error {
            Some(error) if sink.is_empty() => Err(error),
            _ => Ok(sink),
        }
    }
}

#[async_trait]
impl Connector for FinnhubConnector {
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
        let outcome = self.collect(company.ticker(), metrics).await;
        finish(PROVIDER, company, metrics, outcome)
    }
}
