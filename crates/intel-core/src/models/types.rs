use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of external data providers the core knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    SecEdgar,
    AlphaVantage,
    Finnhub,
    NewsApi,
    Crunchbase,
    #[serde(rename = "GITHUB")]
    GitHub,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::SecEdgar,
        ProviderKind::AlphaVantage,
        ProviderKind::Finnhub,
        ProviderKind::NewsApi,
        ProviderKind::Crunchbase,
        ProviderKind::GitHub,
    ];

    /// Stable identifier used in logs, cache keys and env var names.
    pub fn id(&self) -> &'static str {
        match self {
            Self::SecEdgar => "SEC_EDGAR",
            Self::AlphaVantage => "ALPHA_VANTAGE",
            Self::Finnhub => "FINNHUB",
            Self::NewsApi => "NEWS_API",
            Self::Crunchbase => "CRUNCHBASE",
            Self::GitHub => "GITHUB",
        }
    }

    /// How authoritative this source is when confidences tie.
    pub fn authority(&self) -> SourceAuthority {
        match self {
            Self::SecEdgar => SourceAuthority::Regulatory,
            Self::AlphaVantage => SourceAuthority::Fundamentals,
            Self::Finnhub => SourceAuthority::Quote,
            Self::NewsApi | Self::Crunchbase | Self::GitHub => SourceAuthority::Alternative,
        }
    }

    /// How quickly this provider's data goes stale.
    pub fn metric_class(&self) -> MetricClass {
        match self {
            Self::Finnhub | Self::NewsApi => MetricClass::Fast,
            Self::SecEdgar | Self::AlphaVantage | Self::Crunchbase | Self::GitHub => {
                MetricClass::Slow
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.id() == wanted)
            .ok_or_else(|| format!("unknown provider: {}", s))
    }
}

/// Source authority rank. Higher variants outrank lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceAuthority {
    Alternative,
    Quote,
    Fundamentals,
    Regulatory,
}

/// Staleness class, drives default cache TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricClass {
    /// Filings, fundamentals, funding history: hours.
    Slow,
    /// Quotes and news flow: seconds to low minutes.
    Fast,
}

/// Shared metric vocabulary every connector maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    RevenueGrowth,
    NetIncome,
    TotalAssets,
    SharesOutstanding,
    MarketCap,
    SharePrice,
    PeRatio,
    DividendYield,
    Employees,
    Sector,
    SentimentPolarity,
    SentimentSubjectivity,
    NewsVolume,
    TotalFunding,
    FundingRounds,
    FundingMomentum,
    CodeStars,
    CodeRepositories,
    CodeMomentum,
}

impl Metric {
    pub const ALL: [Metric; 20] = [
        Metric::Revenue,
        Metric::RevenueGrowth,
        Metric::NetIncome,
        Metric::TotalAssets,
        Metric::SharesOutstanding,
        Metric::MarketCap,
        Metric::SharePrice,
        Metric::PeRatio,
        Metric::DividendYield,
        Metric::Employees,
        Metric::Sector,
        Metric::SentimentPolarity,
        Metric::SentimentSubjectivity,
        Metric::NewsVolume,
        Metric::TotalFunding,
        Metric::FundingRounds,
        Metric::FundingMomentum,
        Metric::CodeStars,
        Metric::CodeRepositories,
        Metric::CodeMomentum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::RevenueGrowth => "revenue_growth",
            Self::NetIncome => "net_income",
            Self::TotalAssets => "total_assets",
            Self::SharesOutstanding => "shares_outstanding",
            Self::MarketCap => "market_cap",
            Self::SharePrice => "share_price",
            Self::PeRatio => "pe_ratio",
            Self::DividendYield => "dividend_yield",
            Self::Employees => "employees",
            Self::Sector => "sector",
            Self::SentimentPolarity => "sentiment_polarity",
            Self::SentimentSubjectivity => "sentiment_subjectivity",
            Self::NewsVolume => "news_volume",
            Self::TotalFunding => "total_funding",
            Self::FundingRounds => "funding_rounds",
            Self::FundingMomentum => "funding_momentum",
            Self::CodeStars => "code_stars",
            Self::CodeRepositories => "code_repositories",
            Self::CodeMomentum => "code_momentum",
        }
    }

    /// Natural unit of the metric.
    pub fn unit(&self) -> Unit {
        match self {
            Self::Revenue
            | Self::NetIncome
            | Self::TotalAssets
            | Self::MarketCap
            | Self::SharePrice
            | Self::TotalFunding => Unit::Usd,
            Self::RevenueGrowth
            | Self::DividendYield
            | Self::FundingMomentum
            | Self::CodeMomentum => Unit::Ratio,
            Self::SharesOutstanding
            | Self::Employees
            | Self::NewsVolume
            | Self::FundingRounds
            | Self::CodeStars
            | Self::CodeRepositories => Unit::Count,
            Self::PeRatio | Self::SentimentPolarity | Self::SentimentSubjectivity => Unit::Score,
            Self::Sector => Unit::Text,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| format!("unknown metric: {}", s))
    }
}

/// Unit attached to a normalized field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Usd,
    /// Dimensionless fraction, e.g. 0.123 for 12.3%.
    Ratio,
    Count,
    Score,
    Text,
}

/// Ordered set of requested metrics. Ordering keeps cache keys deterministic.
pub type MetricSet = BTreeSet<Metric>;
