//! Error types and retry classification for the aggregation core.
//!
//! This module provides:
//! - [`ProviderError`]: Connector-internal errors; they never escape a connector
//! - [`ErrorClass`]: How a provider error is reported in a `ProviderResult`
//! - [`RetryClass`] / [`RetryPolicy`]: Whether and how a connector retries
//! - [`IntelError`]: The only errors `aggregate` and `health` return

mod retry;

pub use retry::{RetryClass, RetryPolicy};

use std::time::Duration;

use thiserror::Error;

use crate::models::ProviderKind;

/// Errors raised to callers of the core.
///
/// Provider-level problems never show up here; they are folded into the
/// profile's `partial` flag and warnings instead.
#[derive(Error, Debug)]
pub enum IntelError {
    /// The company key is malformed (empty ticker, bad CIK, ...).
    #[error("Invalid company key: {0}")]
    InvalidCompanyKey(String),

    /// `aggregate` was called without any metric to fetch.
    #[error("Empty metric set")]
    EmptyMetricSet,

    /// The provider is not configured in this process.
    #[error("Unknown provider: {0}")]
    UnknownProvider(ProviderKind),

    /// Configuration could not be loaded.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rate limiter or cache could not be used.
    #[error("Infrastructure failure: {0}")]
    Infrastructure(String),
}

/// How a provider error is reported once retries are done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Transient,
    Permanent,
    RateLimited { retry_after: Option<Duration> },
}

/// Errors that can occur inside a connector.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider does not know this company.
    #[error("Company not found: {provider} - {message}")]
    NotFound {
        provider: ProviderKind,
        message: String,
    },

    /// Credential missing, invalid or lacking permission.
    #[error("Unauthorized: {provider}")]
    Unauthorized { provider: ProviderKind },

    /// The provider throttled the request (HTTP 429 or an in-body notice).
    #[error("Rate limited: {provider}")]
    RateLimited {
        provider: ProviderKind,
        retry_after: Option<Duration>,
    },

    /// The request did not complete in time.
    #[error("Timeout: {provider}")]
    Timeout { provider: ProviderKind },

    /// 5xx from the provider.
    #[error("Server error: {provider} - HTTP {status}")]
    Server { provider: ProviderKind, status: u16 },

    /// Any other 4xx.
    #[error("Request rejected: {provider} - HTTP {status}: {message}")]
    Rejected {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    /// The payload did not have the expected shape.
    #[error("Schema mismatch: {provider} - {message}")]
    Schema {
        provider: ProviderKind,
        message: String,
    },

    /// Connection-level failure.
    #[error("Network error: {provider} - {message}")]
    Network {
        provider: ProviderKind,
        message: String,
    },

    /// The company key lacks something this provider needs.
    #[error("Missing input: {provider} - {message}")]
    MissingInput {
        provider: ProviderKind,
        message: String,
    },
}

impl ProviderError {
    pub fn rate_limited(provider: ProviderKind, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            provider,
            retry_after,
        }
    }

    pub fn schema(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Schema {
            provider,
            message: message.into(),
        }
    }

    pub fn not_found(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::NotFound {
            provider,
            message: message.into(),
        }
    }

    pub fn missing_input(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::MissingInput {
            provider,
            message: message.into(),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use signal_intel_core::errors::{ProviderError, RetryClass};
    /// use signal_intel_core::ProviderKind;
    ///
    /// let error = ProviderError::Server { provider: ProviderKind::Finnhub, status: 503 };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = ProviderError::not_found(ProviderKind::SecEdgar, "no filings");
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Timeout { .. } | Self::Server { .. } | Self::Network { .. } => {
                RetryClass::WithBackoff
            }
            Self::RateLimited { .. } => RetryClass::RespectRetryAfter,
            Self::NotFound { .. }
            | Self::Unauthorized { .. }
            | Self::Rejected { .. }
            | Self::Schema { .. }
            | Self::MissingInput { .. } => RetryClass::Never,
        }
    }

    /// How this error is reported in a `ProviderResult`.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Server { .. } | Self::Network { .. } => ErrorClass::Transient,
            Self::RateLimited { retry_after, .. } => ErrorClass::RateLimited {
                retry_after: *retry_after,
            },
            Self::NotFound { .. }
            | Self::Unauthorized { .. }
            | Self::Rejected { .. }
            | Self::Schema { .. }
            | Self::MissingInput { .. } => ErrorClass::Permanent,
        }
    }
}
