//! Alpha Vantage fundamentals connector.
//!
//! Reads the `OVERVIEW` endpoint. Every value arrives as a string
//! (`"2891000000000"`, `"None"`, `"-"`), so all of them go through the safe
//! numeric parser.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute and
//! signals throttling with a `Note` or `Information` body on HTTP 200.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde::Deserialize;

use crate::config::ProviderSettings;
use crate::errors::ProviderError;
use crate::models::{CompanyKey, FieldSink, Metric, MetricSet, ProviderKind, ProviderResult};
use crate::parse::parse_opt;
use crate::provider::{finish, Connector, ConnectorCapabilities, HttpFetcher};
use crate::registry::RateLimiter;

const PROVIDER: ProviderKind = ProviderKind::AlphaVantage;

/// Alpha Vantage asks callers to back off for about a minute when throttled.
const THROTTLE_BACKOFF: Duration = Duration::from_secs(60);

const METRICS: &[Metric] = &[
    Metric::MarketCap,
    Metric::PeRatio,
    Metric::DividendYield,
    Metric::Revenue,
    Metric::RevenueGrowth,
    Metric::SharesOutstanding,
    Metric::Employees,
    Metric::Sector,
];

/// OVERVIEW response. Unknown symbols come back as `{}`.
#[derive(Debug, Default, Deserialize)]
struct OverviewResponse {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    market_capitalization: Option<String>,
    #[serde(rename = "PERatio")]
    pe_ratio: Option<String>,
    /// Already a ratio, e.g. `"0.0055"`.
    #[serde(rename = "DividendYield")]
    dividend_yield: Option<String>,
    #[serde(rename = "RevenueTTM")]
    revenue_ttm: Option<String>,
    /// Already a ratio, e.g. `"0.021"`.
    #[serde(rename = "QuarterlyRevenueGrowthYOY")]
    quarterly_revenue_growth_yoy: Option<String>,
    #[serde(rename = "SharesOutstanding")]
    shares_outstanding: Option<String>,
    #[serde(rename = "FullTimeEmployees")]
    full_time_employees: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Alpha Vantage connector.
pub struct AlphaVantageConnector {
    http: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
    confidence: f64,
}

impl AlphaVantageConnector {
    pub fn new(settings: &ProviderSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: HttpFetcher::new(PROVIDER, limiter, settings.retry, None),
            base_url: settings.base_url.clone(),
            api_key: settings.credential.clone(),
            confidence: settings.confidence,
        }
    }

    async fn fetch_overview(&self, symbol: &str) -> Result<OverviewResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_input(PROVIDER, "API key not configured"))?;

        let params = [("function", "OVERVIEW"), ("symbol", symbol), ("apikey", api_key)];
        let response: OverviewResponse = self.http.get_json(&self.base_url, &params, &[]).await?;

        // Throttling arrives as HTTP 200 with a Note/Information body.
        if let Some(message) = response.note.as_ref().or(response.information.as_ref()) {
            debug!("Alpha Vantage throttled: {}", message);
            return Err(ProviderError::rate_limited(PROVIDER, Some(THROTTLE_BACKOFF)));
        }
        if let Some(message) = &response.error_message {
            return Err(ProviderError::Rejected {
                provider: PROVIDER,
                status: 200,
                message: message.clone(),
            });
        }
        if response.symbol.is_none() {
            return Err(ProviderError::not_found(
                PROVIDER,
                format!("no overview for {}", symbol),
            ));
        }

        Ok(response)
    }

    fn map_overview(&self, overview: &OverviewResponse) -> FieldSink {
        let mut sink = FieldSink::new(PROVIDER, Utc::now(), self.confidence);
        sink.parsed(
            Metric::MarketCap,
            parse_opt(overview.market_capitalization.as_deref()),
        );
        sink.parsed(Metric::PeRatio, parse_opt(overview.pe_ratio.as_deref()));
        sink.parsed(
            Metric::DividendYield,
            parse_opt(overview.dividend_yield.as_deref()),
        );
        sink.parsed(Metric::Revenue, parse_opt(overview.revenue_ttm.as_deref()));
        sink.parsed(
            Metric::RevenueGrowth,
            parse_opt(overview.quarterly_revenue_growth_yoy.as_deref()),
        );
        sink.parsed(
            Metric::SharesOutstanding,
            parse_opt(overview.shares_outstanding.as_deref()),
        );
        sink.parsed(
            Metric::Employees,
            parse_opt(overview.full_time_employees.as_deref()),
        );
        sink.text(Metric::Sector, overview.sector.as_deref());
        sink
    }
}

#[async_trait]
impl Connector for AlphaVantageConnector {
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
        let outcome = self
            .fetch_overview(company.ticker())
            .await
            .map(|overview| self.map_overview(&overview));
        finish(PROVIDER, company, metrics, outcome)
    }
}
