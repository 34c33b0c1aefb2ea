//! Shared HTTP plumbing for connectors.
//!
//! Every attempt first takes a slot from the provider's shared limiter, so
//! retries count against the published quota like any other call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::{ProviderError, RetryClass, RetryPolicy};
use crate::models::ProviderKind;
use crate::registry::RateLimiter;

const USER_AGENT: &str = concat!("signal-intel/", env!("CARGO_PKG_VERSION"));
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 200;

/// Rate-limited, retrying GET client for one provider.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    provider: ProviderKind,
    client: Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(
        provider: ProviderKind,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        user_agent: Option<&str>,
    ) -> Self {
        let client = Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            provider,
            client,
            limiter,
            retry,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let body = self.get_text(url, query, headers).await?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::schema(self.provider, format!("failed to decode response: {}", e))
        })
    }

    /// GET `url` and return the body, retrying transient failures.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<String, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.attempt(url, query, headers).await {
                Ok(body) => return Ok(body),
                Err(error) => {
                    let delay = match error.retry_class() {
                        RetryClass::WithBackoff => self.retry.delay_after(attempt),
                        RetryClass::Never | RetryClass::RespectRetryAfter => None,
                    };
                    match delay {
                        Some(delay) => {
                            warn!(
                                "{} attempt {} failed ({}), retrying in {:?}",
                                self.provider, attempt, error, delay
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => return Err(error),
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<String, ProviderError> {
        self.limiter.acquire().await;

        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        debug!("{} request: {} with {} params", self.provider, url, query.len());

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    provider: self.provider,
                }
            } else {
                ProviderError::Network {
                    provider: self.provider,
                    message: format!("request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response.text().await.map_err(|e| ProviderError::Network {
                provider: self.provider,
                message: format!("failed to read response: {}", e),
            });
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(self.provider, status, &headers, &body))
    }
}

/// Map a non-success HTTP status onto the provider error taxonomy.
pub(crate) fn classify_status(
    provider: ProviderKind,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::rate_limited(provider, retry_after(headers));
    }
    if status == StatusCode::FORBIDDEN && quota_exhausted(headers) {
        return ProviderError::rate_limited(provider, quota_reset(headers));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::Unauthorized { provider };
    }
    if status == StatusCode::NOT_FOUND {
        return ProviderError::not_found(provider, truncate(body));
    }
    if status.is_server_error() {
        return ProviderError::Server {
            provider,
            status: status.as_u16(),
        };
    }
    ProviderError::Rejected {
        provider,
        status: status.as_u16(),
        message: truncate(body),
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// `Retry-After` in delta-seconds form.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, "retry-after").map(Duration::from_secs)
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    header_u64(headers, "x-ratelimit-remaining") == Some(0)
}

/// Wait until an `x-ratelimit-reset` epoch timestamp.
fn quota_reset(headers: &HeaderMap) -> Option<Duration> {
    let reset = header_u64(headers, "x-ratelimit-reset")?;
    let now = Utc::now().timestamp().max(0) as u64;
    Some(Duration::from_secs(reset.saturating_sub(now)))
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
