use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::company::CompanyKey;
use super::field::FieldValue;
use super::result::{FailureClass, ProviderStatus};
use super::types::{Metric, ProviderKind, Unit};

/// How a metric's final value was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMethod {
    /// Only one successful provider supplied the metric.
    SingleSource,
    /// Several providers agreed within tolerance; confidence-weighted mean.
    WeightedMean,
    /// Several providers reported the same text value.
    Unanimous,
    /// Providers disagreed; the most confident (then most authoritative) won.
    HighestConfidence,
}

/// A value that lost conflict resolution. Kept so discrepancies stay visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedValue {
    pub provider: ProviderKind,
    pub value: FieldValue,
    pub confidence: f64,
}

/// Final value of one metric, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMetric {
    pub value: FieldValue,
    pub unit: Unit,
    pub method: ResolutionMethod,
    /// Providers whose value is reflected in `value`.
    pub agreeing: Vec<ProviderKind>,
    /// Providers whose value was outvoted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedValue>,
}

impl ResolvedMetric {
    pub fn number(&self) -> Option<f64> {
        self.value.as_number()
    }
}

/// Category of a profile warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    ProviderTimeout,
    ProviderTransient,
    ProviderPermanent,
    ProviderRateLimited,
    ParseAmbiguous,
    /// Informational: providers disagreed beyond tolerance.
    ConflictUnresolvedNote,
}

impl From<FailureClass> for WarningKind {
    fn from(class: FailureClass) -> Self {
        match class {
            FailureClass::Timeout => Self::ProviderTimeout,
            FailureClass::Transient => Self::ProviderTransient,
            FailureClass::Permanent => Self::ProviderPermanent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderWarning {
    pub provider: ProviderKind,
    pub kind: WarningKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    pub message: String,
}

/// Per-provider outcome summary of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: ProviderKind,
    pub status: ProviderStatus,
    pub field_count: usize,
}

/// One normalized input to the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub metric: Metric,
    /// Metric value mapped onto `[0, 1]`.
    pub normalized: f64,
    /// Weight after renormalization over present metrics.
    pub weight: f64,
}

/// Derived composite score. Not traceable to a single provider field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Weighted score on a 0-100 scale.
    pub value: f64,
    pub components: Vec<ScoreComponent>,
}

/// Aggregation output for one company. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedProfile {
    pub company: CompanyKey,
    pub metrics: BTreeMap<Metric, ResolvedMetric>,
    pub composite_score: Option<CompositeScore>,
    /// True when any dispatched provider did not succeed.
    pub partial: bool,
    pub warnings: Vec<ProviderWarning>,
    pub providers: Vec<ProviderOutcome>,
}

impl AggregatedProfile {
    pub fn metric(&self, metric: Metric) -> Option<&ResolvedMetric> {
        self.metrics.get(&metric)
    }

    pub fn score(&self) -> Option<f64> {
        self.composite_score.as_ref().map(|s| s.value)
    }

    /// Warnings attributed to one provider.
    pub fn warnings_for(&self, provider: ProviderKind) -> impl Iterator<Item = &ProviderWarning> {
        self.warnings.iter().filter(move |w| w.provider == provider)
    }
}
