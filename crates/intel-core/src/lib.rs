//! Signal Intel Core
//!
//! Concurrent aggregation of company intelligence from several external
//! providers into one normalized, provenance-tracked profile.
//!
//! # Overview
//!
//! The core supports:
//! - Regulatory filings (SEC EDGAR), fundamentals and quotes (Alpha Vantage, Finnhub)
//! - News sentiment (NewsAPI), funding history (Crunchbase), code activity (GitHub)
//! - Per-provider sliding-window rate limiting shared across calls
//! - A single-flight TTL cache in front of every connector
//! - Deterministic conflict resolution and a composite score
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   CompanyKey     |  (ticker, optional CIK and name)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |   Aggregator     | --> |   ResultCache    |  (single-flight, TTL)
//! +------------------+     +------------------+
//!          |                        |
//!          |                        v
//!          |               +------------------+     +-------------+
//!          |               |    Connector     | --> | RateLimiter |
//!          |               +------------------+     +-------------+
//!          |                        |
//!          v                        v
//! +------------------+     +------------------+
//! | resolve + score  | <-- |  ProviderResult  |
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! | AggregatedProfile|
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`CompanyKey`] - Canonical company identity
//! - [`ProviderField`] - One normalized datum with source and confidence
//! - [`ProviderResult`] - Outcome of one connector call
//! - [`AggregatedProfile`] - Resolved metrics, score, partial flag and warnings
//! - [`Aggregator`] - The `aggregate` and `health` entry points

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod parse;
pub mod provider;
pub mod registry;
pub mod scoring;

// Re-export all public types from models
pub use models::{
    AggregatedProfile, CompanyKey, CompositeScore, FailureClass, FieldValue, Metric, MetricClass,
    MetricSet, Outcome, ProviderField, ProviderKind, ProviderOutcome, ProviderResult,
    ProviderStatus, ProviderWarning, ResolutionMethod, ResolvedMetric, SourceAuthority, Unit,
    WarningKind,
};

pub use aggregator::Aggregator;
pub use cache::{CacheKey, CacheTtl, ResultCache};
pub use config::{IntelConfig, ProviderSettings};
pub use errors::{IntelError, ProviderError};
pub use parse::{parse_json, parse_str, ParseOutcome};
pub use provider::{build_connectors, Connector, ConnectorCapabilities};
pub use registry::{ProviderHealth, RateLimit, RateLimiter, RateLimiterRegistry};
pub use scoring::CompositeScorer;
