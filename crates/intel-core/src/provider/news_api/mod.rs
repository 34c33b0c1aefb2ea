//! NewsAPI sentiment connector.
//!
//! Searches `/v2/everything` for the company and scores headline plus
//! description of each article with the lexicon analyzer in [`sentiment`].
//!
//! The free developer plan allows 100 requests per day.

pub mod sentiment;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::errors::ProviderError;
use crate::models::{CompanyKey, FieldSink, Metric, MetricSet, ProviderKind, ProviderResult};
use crate::provider::{finish, Connector, ConnectorCapabilities, HttpFetcher};
use crate::registry::RateLimiter;

const PROVIDER: ProviderKind = ProviderKind::NewsApi;
const PAGE_SIZE: &str = "50";

const METRICS: &[Metric] = &[
    Metric::SentimentPolarity,
    Metric::SentimentSubjectivity,
    Metric::NewsVolume,
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EverythingResponse {
    status: String,
    code: Option<String>,
    message: Option<String>,
    total_results: Option<u64>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
}

impl Article {
    fn text(&self) -> String {
        [self.title.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(". ")
    }
}

/// NewsAPI connector.
pub struct NewsApiConnector {
    http: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
    confidence: f64,
}

impl NewsApiConnector {
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

        let query = format!("\"{}\"", company.search_term());
        let params = [
            ("q", query.as_str()),
            ("language", "en"),
            ("sortBy", "publishedAt"),
            ("pageSize", PAGE_SIZE),
        ];
        let url = format!("{}/everything", self.base_url);
        let response: EverythingResponse = self
            .http
            .get_json(&url, &params, &[("X-Api-Key", api_key)])
            .await?;

        if response.status != "ok" {
            return Err(body_error(&response));
        }

        debug!(
            "NewsAPI returned {} of {:?} articles for {}",
            response.articles.len(),
            response.total_results,
            company
        );

        let mut sink = FieldSink::new(PROVIDER, Utc::now(), self.confidence);
        let volume = response
            .total_results
            .unwrap_or(response.articles.len() as u64);
        sink.number(Metric::NewsVolume, Some(volume as f64));

        let texts: Vec<String> = response.articles.iter().map(Article::text).collect();
        if let Some(mean) = sentiment::analyze_batch(texts.iter().map(String::as_str)) {
            sink.number(Metric::SentimentPolarity, Some(mean.polarity));
            sink.number(Metric::SentimentSubjectivity, Some(mean.subjectivity));
        }
        Ok(sink)
    }
}

/// Errors NewsAPI reports inside an HTTP 200 body.
fn body_error(response: &EverythingResponse) -> ProviderError {
    let message = response.message.clone().unwrap_or_default();
    match response.code.as_deref() {
        Some("rateLimited") => ProviderError::rate_limited(PROVIDER, None),
        Some("apiKeyInvalid") | Some("apiKeyMissing") | Some("apiKeyDisabled") => {
            ProviderError::Unauthorized { provider: PROVIDER }
        }
        _ => ProviderError::Rejected {
            provider: PROVIDER,
            status: 200,
            message,
        },
    }
}

#[async_trait]
impl Connector for NewsApiConnector {
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
    use crate::models::ProviderStatus;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector(server: &MockServer) -> NewsApiConnector {
        let mut settings = ProviderSettings::defaults_for(PROVIDER);
        settings.base_url = server.uri();
        settings.credential = Some("news-key".to_string());
        settings.retry = RetryPolicy::none();
        NewsApiConnector::new(&settings, Arc::new(RateLimiter::unlimited(PROVIDER)))
    }

    fn number(result: &ProviderResult, metric: Metric) -> Option<f64> {
        result
            .fields()
            .iter()
            .find(|f| f.metric == metric)
            .and_then(|f| f.value.as_number())
    }

    #[tokio::test]
    async fn test_scores_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .and(query_param("q", "\"Apple Inc.\""))
            .and(header("X-Api-Key", "news-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "totalResults": 312,
                "articles": [
                    { "title": "Apple posts record profit", "description": "Shares surge after strong quarter" },
                    { "title": "Apple faces probe in Europe", "description": null }
                ]
            })))
            .mount(&server)
            .await;

        let company = CompanyKey::new("AAPL").unwrap().with_name("Apple Inc.");
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;

        assert!(result.is_success());
        assert_eq!(number(&result, Metric::NewsVolume), Some(312.0));
        let polarity = number(&result, Metric::SentimentPolarity).unwrap();
        assert!(polarity > -1.0 && polarity < 1.0);
        let subjectivity = number(&result, Metric::SentimentSubjectivity).unwrap();
        assert!((0.0..=1.0).contains(&subjectivity));
    }

    #[tokio::test]
    async fn test_no_articles_yields_volume_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok", "totalResults": 0, "articles": []
            })))
            .mount(&server)
            .await;

        let company = CompanyKey::new("TINY").unwrap();
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;
        assert_eq!(result.fields().len(), 1);
        assert_eq!(number(&result, Metric::NewsVolume), Some(0.0));
    }

    #[tokio::test]
    async fn test_rate_limited_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error", "code": "rateLimited", "message": "You have made too many requests"
            })))
            .mount(&server)
            .await;

        let company = CompanyKey::new("AAPL").unwrap();
        let metrics: MetricSet = METRICS.iter().copied().collect();
        let result = connector(&server).fetch(&company, &metrics).await;
        assert_eq!(result.status(), ProviderStatus::RateLimited);
    }
}
