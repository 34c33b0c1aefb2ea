//! Connector abstractions and implementations.
//!
//! This module contains:
//! - The `Connector` trait that all external data sources implement
//! - Connector capabilities used to decide which connectors to dispatch
//! - Shared rate-limited HTTP plumbing (`HttpFetcher`)
//! - Concrete connectors (SEC EDGAR, Alpha Vantage, Finnhub, NewsAPI, Crunchbase, GitHub)
//!
//! Connectors receive their shared rate limiter at construction. They never
//! raise errors; every outcome is a `ProviderResult`.

mod capabilities;
mod http;
mod traits;

pub mod alpha_vantage;
pub mod crunchbase;
pub mod finnhub;
pub mod github;
pub mod news_api;
pub mod sec_edgar;

use std::sync::Arc;

use log::info;

use crate::config::IntelConfig;
use crate::models::{CompanyKey, ProviderKind};
use crate::registry::RateLimiterRegistry;

// Re-exports
pub use alpha_vantage::AlphaVantageConnector;
pub use capabilities::ConnectorCapabilities;
pub use crunchbase::CrunchbaseConnector;
pub use finnhub::FinnhubConnector;
pub use github::GitHubConnector;
pub use http::HttpFetcher;
pub use news_api::NewsApiConnector;
pub use sec_edgar::SecEdgarConnector;
pub use traits::{finish, Connector};

/// Legal-form words dropped when deriving an organization slug.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "com",
    "ltd",
    "limited",
    "plc",
    "llc",
    "holdings",
    "group",
    "sa",
    "ag",
    "nv",
];

/// Organization handle used by Crunchbase and GitHub, e.g. "Stripe, Inc." -> "stripe".
pub(crate) fn org_slug(company: &CompanyKey) -> String {
    let words: Vec<String> = company
        .name()
        .unwrap_or_default()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !LEGAL_SUFFIXES.contains(&w.as_str()))
        .collect();

    if words.is_empty() {
        company.ticker().to_lowercase()
    } else {
        words.join("-")
    }
}

/// Build one connector per active provider, each wired to its shared limiter.
pub fn build_connectors(
    config: &IntelConfig,
    limiters: &mut RateLimiterRegistry,
) -> Vec<Arc<dyn Connector>> {
    let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();

    for provider in config.active_providers() {
        let Some(settings) = config.settings(provider) else {
            continue;
        };
        let limiter = limiters.get_or_unlimited(provider);
        let connector: Arc<dyn Connector> = match provider {
            ProviderKind::SecEdgar => Arc::new(SecEdgarConnector::new(settings, limiter)),
            ProviderKind::AlphaVantage => Arc::new(AlphaVantageConnector::new(settings, limiter)),
            ProviderKind::Finnhub => Arc::new(FinnhubConnector::new(settings, limiter)),
            ProviderKind::NewsApi => Arc::new(NewsApiConnector::new(settings, limiter)),
            ProviderKind::Crunchbase => Arc::new(CrunchbaseConnector::new(settings, limiter)),
            ProviderKind::GitHub => Arc::new(GitHubConnector::new(settings, limiter)),
        };
        connectors.push(connector);
    }

    info!(
        "Configured {} connector(s): {}",
        connectors.len(),
        connectors
            .iter()
            .map(|c| c.id())
            .collect::<Vec<_>>()
            .join(", ")
    );
    connectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_slug() {
        let key = |name: &str| CompanyKey::new("X").unwrap().with_name(name);
        assert_eq!(org_slug(&key("Apple Inc.")), "apple");
        assert_eq!(org_slug(&key("Amazon.com, Inc.")), "amazon");
        assert_eq!(org_slug(&key("Palantir Technologies Inc.")), "palantir-technologies");
        assert_eq!(org_slug(&CompanyKey::new("MSFT").unwrap()), "msft");
    }

    #[test]
    fn test_build_connectors_skips_inactive_providers() {
        let config = IntelConfig::from_lookup(|key| {
            (key == "SIGNAL_INTEL_FINNHUB_API_KEY").then(|| "k".to_string())
        })
        .unwrap();
        let mut limiters = config.build_limiters();
        let connectors = build_connectors(&config, &mut limiters);

        let kinds: Vec<ProviderKind> = connectors.iter().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            vec![ProviderKind::SecEdgar, ProviderKind::Finnhub, ProviderKind::GitHub]
        );
    }
}
