//! GitHub code-activity connector.
//!
//! The repository count comes from the organization record; stars and code
//! momentum are computed over the paginated repository listing, read up to
//! ten pages of 100. Code momentum is the share of repositories pushed to
//! in the last 30 days.
//!
//! Unauthenticated callers get 60 requests per hour; GitHub signals an
//! exhausted quota with `403` and `x-ratelimit-remaining: 0`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ProviderSettings;
use crate::errors::ProviderError;
use crate::models::{CompanyKey, FieldSink, Metric, MetricSet, ProviderKind, ProviderResult};
use crate::provider::{finish, org_slug, Connector, ConnectorCapabilities, HttpFetcher};
use crate::registry::RateLimiter;

const PROVIDER: ProviderKind = ProviderKind::GitHub;
const ACTIVE_WINDOW_DAYS: i64 = 30;
const PAGE_SIZE: usize = 100;
/// Listing cap per fetch; larger organizations are summarized from the first pages.
const MAX_PAGES: u32 = 10;

const METRICS: &[Metric] = &[
    Metric::CodeRepositories,
    Metric::CodeStars,
    Metric::CodeMomentum,
];

#[derive(Debug, Deserialize)]
struct Organization {
    public_repos: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    #[serde(default)]
    stargazers_count: u64,
    pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    archived: bool,
}

/// GitHub connector.
pub struct GitHubConnector {
    http: HttpFetcher,
    base_url: String,
    token: Option<String>,
    confidence: f64,
}

impl GitHubConnector {
    pub fn new(settings: &ProviderSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: HttpFetcher::new(
                PROVIDER,
                limiter,
                settings.retry,
                settings.user_agent.as_deref(),
            ),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.credential.clone(),
            confidence: settings.confidence,
        }
    }

    async fn collect(
        &self,
        company: &CompanyKey,
        metrics: &MetricSet,
    ) -> Result<FieldSink, ProviderError> {
        let org = urlencoding::encode(&org_slug(company)).into_owned();

        let bearer = self.token.as_ref().map(|t| format!("Bearer {}", t));
        let mut headers = vec![("Accept", "application/vnd.github+json")];
        if let Some(bearer) = bearer.as_deref() {
            headers.push(("Authorization", bearer));
        }

        let fetched_at = Utc::now();
        let mut sink = FieldSink::new(PROVIDER, fetched_at, self.confidence);

        let mut public_repos = None;
        if metrics.contains(&Metric::CodeRepositories) {
            let url = format!("{}/orgs/{}", self.base_url, org);
            let organization: Organization = self.http.get_json(&url, &[], &headers).await?;
            public_repos = organization.public_repos;
        }

        let mut listing = None;
        if metrics.contains(&Metric::CodeStars) || metrics.contains(&Metric::CodeMomentum) {
            let (repos, complete) = self.list_repositories(&org, &headers).await?;
            debug!(
                "GitHub org {} listed {} public repositories (complete={})",
                org,
                repos.len(),
                complete
            );
            if public_repos.is_none() && complete {
                public_repos = Some(repos.len() as u64);
            }
            listing = Some(repos);
        }

        sink.number(Metric::CodeRepositories, public_repos.map(|n| n as f64));
        if let Some(repos) = listing {
            sink.number(
                Metric::CodeStars,
                Some(repos.iter().map(|r| r.stargazers_count).sum::<u64>() as f64),
            );
            sink.number(Metric::CodeMomentum, momentum(&repos, fetched_at));
        }
        Ok(sink)
    }

    /// Public repositories page by page until a short page or [`MAX_PAGES`].
    ///
    /// The flag is false when the cap cut the listing short.
    async fn list_repositories(
        &self,
        org: &str,
        headers: &[(&str, &str)],
    ) -> Result<(Vec<Repository>, bool), ProviderError> {
        let url = format!("{}/orgs/{}/repos", self.base_url, org);
        let per_page = PAGE_SIZE.to_string();
        let mut repos = Vec::new();

        for page in 1..=MAX_PAGES {
            let page = page.to_string();
            let params = [
                ("type", "public"),
                ("sort", "full_name"),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ];
            let batch: Vec<Repository> = self.http.get_json(&url, &params, headers).await?;
            let last = batch.len() < PAGE_SIZE;
            repos.extend(batch);
            if last {
                return Ok((repos, true));
            }
        }

        warn!(
            "GitHub org {} listing capped at {} repositories",
            org,
            repos.len()
        );
        Ok((repos, false))
    }
}

/// Share of live repositories pushed within the activity window.
fn momentum(repos: &[Repository], now: DateTime<Utc>) -> Option<f64> {
    let live: Vec<&Repository> = repos.iter().filter(|r| !r.archived).collect();
    if live.is_empty() {
        return None;
    }
    let cutoff = now - Duration::days(ACTIVE_WINDOW_DAYS);
    let active = live
        .iter()
        .filter(|r| r.pushed_at.map(|p| p >= cutoff).unwrap_or(false))
        .count();
    Some(active as f64 / live.len() as f64)
}

#[async_trait]
impl Connector for GitHubConnector {
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
        let outcome = self.collect(company, metrics).await;
        finish(PROVIDER, company, metrics, outcome)
    }
}
