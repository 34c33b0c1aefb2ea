//! Provider and aggregation configuration.
//!
//! Settings come from JSON (for collaborators that own a config file) or
//! from `SIGNAL_INTEL_*` environment variables. Every provider has defaults
//! taken from its published limits; configuration only overrides them.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{IntelError, RetryPolicy};
use crate::models::{MetricClass, ProviderKind};
use crate::registry::{RateLimit, RateLimiterRegistry};

/// Default agreement tolerance between providers (2%).
pub const DEFAULT_TOLERANCE: f64 = 0.02;

/// Default minimum number of scored metrics for a composite score.
pub const DEFAULT_MIN_SCORED_METRICS: usize = 2;

const DEFAULT_DEADLINE_MS: u64 = 30_000;
const ENV_PREFIX: &str = "SIGNAL_INTEL";

/// Settings for one provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub base_url: String,
    /// Secondary endpoint, e.g. EDGAR's ticker-to-CIK lookup file.
    pub lookup_url: Option<String>,
    #[serde(skip_serializing)]
    pub credential: Option<String>,
    pub user_agent: Option<String>,
    pub rate_limit: RateLimit,
    pub timeout_ms: u64,
    pub cache_ttl_success_secs: u64,
    pub cache_ttl_failure_secs: u64,
    /// Static reliability weight stamped on every field from this provider.
    pub confidence: f64,
    pub retry: RetryPolicy,
}

impl ProviderSettings {
    /// Defaults from each provider's published free-tier contract.
    pub fn defaults_for(provider: ProviderKind) -> Self {
        let success_ttl = match provider.metric_class() {
            MetricClass::Slow => 6 * 3_600,
            MetricClass::Fast => 60,
        };
        let base = Self {
            enabled: true,
            base_url: String::new(),
            lookup_url: None,
            credential: None,
            user_agent: None,
            rate_limit: RateLimit::per_minute(60),
            timeout_ms: 10_000,
            cache_ttl_success_secs: success_ttl,
            cache_ttl_failure_secs: 30,
            confidence: 0.5,
            retry: RetryPolicy::default(),
        };

        match provider {
            ProviderKind::SecEdgar => Self {
                base_url: "https://data.sec.gov".to_string(),
                lookup_url: Some("https://www.sec.gov/files/company_tickers.json".to_string()),
                user_agent: Some("signal-intel/0.4 (ops@example.com)".to_string()),
                rate_limit: RateLimit::per_second(10),
                confidence: 0.95,
                ..base
            },
            ProviderKind::AlphaVantage => Self {
                base_url: "https://www.alphavantage.co/query".to_string(),
                rate_limit: RateLimit::per_minute(5),
                confidence: 0.8,
                ..base
            },
            ProviderKind::Finnhub => Self {
                base_url: "https://finnhub.io/api/v1".to_string(),
                rate_limit: RateLimit::per_minute(60),
                timeout_ms: 5_000,
                cache_ttl_failure_secs: 15,
                confidence: 0.7,
                ..base
            },
            ProviderKind::NewsApi => Self {
                base_url: "https://newsapi.org/v2".to_string(),
                rate_limit: RateLimit::per_day(100),
                // 100 calls a day does not survive a one-minute TTL
                cache_ttl_success_secs: 15 * 60,
                confidence: 0.6,
                ..base
            },
            ProviderKind::Crunchbase => Self {
                base_url: "https://api.crunchbase.com/api/v4".to_string(),
                rate_limit: RateLimit::per_minute(200),
                cache_ttl_success_secs: 12 * 3_600,
                cache_ttl_failure_secs: 60,
                confidence: 0.7,
                ..base
            },
            ProviderKind::GitHub => Self {
                base_url: "https://api.github.com".to_string(),
                rate_limit: RateLimit::per_hour(60),
                confidence: 0.75,
                ..base
            },
        }
    }

    /// Providers that refuse anonymous calls.
    pub fn requires_credential(provider: ProviderKind) -> bool {
        matches!(
            provider,
            ProviderKind::AlphaVantage
                | ProviderKind::Finnhub
                | ProviderKind::NewsApi
                | ProviderKind::Crunchbase
        )
    }

    /// Enabled and, where required, holding a credential.
    pub fn is_active(&self, provider: ProviderKind) -> bool {
        self.enabled && (!Self::requires_credential(provider) || self.credential.is_some())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn ttl_success(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_success_secs)
    }

    pub fn ttl_failure(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_failure_secs)
    }

    fn apply(&mut self, overrides: ProviderOverrides) {
        if let Some(v) = overrides.enabled {
            self.enabled = v;
        }
        if let Some(v) = overrides.base_url {
            self.base_url = v;
        }
        if let Some(v) = overrides.lookup_url {
            self.lookup_url = Some(v);
        }
        if let Some(v) = overrides.credential {
            self.credential = Some(v);
        }
        if let Some(v) = overrides.user_agent {
            self.user_agent = Some(v);
        }
        if let Some(v) = overrides.rate_limit {
            self.rate_limit = v;
        }
        if let Some(v) = overrides.timeout_ms {
            self.timeout_ms = v;
        }
        if let Some(v) = overrides.cache_ttl_success {
            self.cache_ttl_success_secs = v;
        }
        if let Some(v) = overrides.cache_ttl_failure {
            self.cache_ttl_failure_secs = v;
        }
        if let Some(v) = overrides.confidence {
            self.confidence = v.clamp(0.0, 1.0);
        }
        if let Some(v) = overrides.retry {
            self.retry = v;
        }
    }
}

/// Partial provider settings as they appear in a config file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderOverrides {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub lookup_url: Option<String>,
    pub credential: Option<String>,
    pub user_agent: Option<String>,
    pub rate_limit: Option<RateLimit>,
    pub timeout_ms: Option<u64>,
    pub cache_ttl_success: Option<u64>,
    pub cache_ttl_failure: Option<u64>,
    pub confidence: Option<f64>,
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    providers: HashMap<ProviderKind, ProviderOverrides>,
    tolerance: Option<f64>,
    min_scored_metrics: Option<usize>,
    default_deadline_ms: Option<u64>,
}

/// Top-level configuration of the aggregation core.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntelConfig {
    pub providers: BTreeMap<ProviderKind, ProviderSettings>,
    /// Relative tolerance under which provider values count as agreeing.
    pub tolerance: f64,
    pub min_scored_metrics: usize,
    pub default_deadline_ms: u64,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            providers: ProviderKind::ALL
                .iter()
                .map(|p| (*p, ProviderSettings::defaults_for(*p)))
                .collect(),
            tolerance: DEFAULT_TOLERANCE,
            min_scored_metrics: DEFAULT_MIN_SCORED_METRICS,
            default_deadline_ms: DEFAULT_DEADLINE_MS,
        }
    }
}

impl IntelConfig {
    /// Parse a JSON document and layer it over the defaults.
    pub fn from_json(json: &str) -> Result<Self, IntelError> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| IntelError::InvalidConfig(format!("invalid JSON config: {}", e)))?;

        let mut config = Self::default();
        for (provider, overrides) in raw.providers {
            if let Some(settings) = config.providers.get_mut(&provider) {
                settings.apply(overrides);
            }
        }
        if let Some(tolerance) = raw.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(min) = raw.min_scored_metrics {
            config.min_scored_metrics = min;
        }
        if let Some(deadline) = raw.default_deadline_ms {
            config.default_deadline_ms = deadline;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `SIGNAL_INTEL_*` environment variables.
    pub fn from_env() -> Result<Self, IntelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Keys follow `SIGNAL_INTEL_<PROVIDER>_<OPTION>`, e.g.
    /// `SIGNAL_INTEL_FINNHUB_API_KEY` or `SIGNAL_INTEL_ALPHA_VANTAGE_RATE_LIMIT=5/minute`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IntelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        for provider in ProviderKind::ALL {
            let var = |option: &str| {
                lookup(&format!("{}_{}_{}", ENV_PREFIX, provider.id(), option))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };

            let overrides = ProviderOverrides {
                enabled: var("ENABLED").map(|v| parse_bool(&v)).transpose()?,
                base_url: var("BASE_URL"),
                lookup_url: var("LOOKUP_URL"),
                credential: var("API_KEY"),
                user_agent: var("USER_AGENT"),
                rate_limit: var("RATE_LIMIT").map(|v| parse_rate_limit(&v)).transpose()?,
                timeout_ms: var("TIMEOUT_MS").map(|v| parse_num(&v)).transpose()?,
                cache_ttl_success: var("CACHE_TTL_SUCCESS").map(|v| parse_num(&v)).transpose()?,
                cache_ttl_failure: var("CACHE_TTL_FAILURE").map(|v| parse_num(&v)).transpose()?,
                confidence: var("CONFIDENCE").map(|v| parse_num(&v)).transpose()?,
                retry: None,
            };

            if let Some(settings) = config.providers.get_mut(&provider) {
                settings.apply(overrides);
            }
        }

        if let Some(v) = lookup(&format!("{}_TOLERANCE", ENV_PREFIX)) {
            config.tolerance = parse_num(&v)?;
        }
        if let Some(v) = lookup(&format!("{}_MIN_SCORED_METRICS", ENV_PREFIX)) {
            config.min_scored_metrics = parse_num(&v)?;
        }
        if let Some(v) = lookup(&format!("{}_DEADLINE_MS", ENV_PREFIX)) {
            config.default_deadline_ms = parse_num(&v)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), IntelError> {
        if !(0.0..1.0).contains(&self.tolerance) {
            return Err(IntelError::InvalidConfig(format!(
                "tolerance must be in [0, 1), got {}",
                self.tolerance
            )));
        }
        if self.min_scored_metrics == 0 {
            return Err(IntelError::InvalidConfig(
                "min_scored_metrics must be at least 1".to_string(),
            ));
        }
        for (provider, settings) in &self.providers {
            if let RateLimit::Windowed {
                capacity,
                window_ms,
            } = settings.rate_limit
            {
                if capacity == 0 || window_ms == 0 {
                    return Err(IntelError::InvalidConfig(format!(
                        "{}: rate limit needs a non-zero capacity and window, got {}/{}ms",
                        provider, capacity, window_ms
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn settings(&self, provider: ProviderKind) -> Option<&ProviderSettings> {
        self.providers.get(&provider)
    }

    /// Providers that are enabled and have what they need to run.
    pub fn active_providers(&self) -> Vec<ProviderKind> {
        self.providers
            .iter()
            .filter(|(kind, settings)| settings.is_active(**kind))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// One shared limiter per active provider.
    pub fn build_limiters(&self) -> RateLimiterRegistry {
        RateLimiterRegistry::from_limits(
            self.active_providers()
                .into_iter()
                .filter_map(|p| self.settings(p).map(|s| (p, s.rate_limit))),
        )
    }

    pub fn default_deadline(&self) -> Duration {
        Duration::from_millis(self.default_deadline_ms)
    }
}

fn parse_num<T: std::str::FromStr>(value: &str) -> Result<T, IntelError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| IntelError::InvalidConfig(format!("not a number: {}", value)))
}

fn parse_bool(value: &str) -> Result<bool, IntelError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IntelError::InvalidConfig(format!("not a boolean: {}", value))),
    }
}

/// Parse `unlimited` or `<capacity>/<window>` where window is
/// `second`, `minute`, `hour`, `day` or a millisecond count like `1500ms`.
fn parse_rate_limit(value: &str) -> Result<RateLimit, IntelError> {
    let value = value.trim().to_ascii_lowercase();
    if value == "unlimited" {
        return Ok(RateLimit::Unlimited);
    }

    let (capacity, window) = value
        .split_once('/')
        .ok_or_else(|| IntelError::InvalidConfig(format!("invalid rate limit: {}", value)))?;
    let capacity: u32 = parse_num(capacity)?;
    if capacity == 0 {
        return Err(IntelError::InvalidConfig(format!(
            "rate limit capacity must be positive: {}",
            value
        )));
    }
    let window = match window.trim() {
        "s" | "sec" | "second" => Duration::from_secs(1),
        "m" | "min" | "minute" => Duration::from_secs(60),
        "h" | "hour" => Duration::from_secs(3_600),
        "d" | "day" => Duration::from_secs(86_400),
        other => match other.strip_suffix("ms") {
            Some(ms) => match parse_num(ms)? {
                0 => {
                    return Err(IntelError::InvalidConfig(format!(
                        "rate limit window must be positive: {}",
                        value
                    )))
                }
                ms => Duration::from_millis(ms),
            },
            None => {
                return Err(IntelError::InvalidConfig(format!(
                    "invalid rate limit window: {}",
                    other
                )))
            }
        },
    };
    Ok(RateLimit::per_window(capacity, window))
}
