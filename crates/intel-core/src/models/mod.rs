//! Company intelligence models
//!
//! This module contains the core data types for aggregation:
//! - `types` - Provider identity, metric vocabulary and units
//! - `company` - Canonical company identity (CompanyKey)
//! - `field` - Normalized provider datum (ProviderField, FieldValue)
//! - `result` - Connector outcome (ProviderResult)
//! - `profile` - Aggregation output (AggregatedProfile) and provenance types

mod company;
mod field;
mod profile;
mod result;
mod types;

pub use company::CompanyKey;
pub use field::{FieldSink, FieldValue, ProviderField};
pub use profile::{
    AggregatedProfile, CompositeScore, ProviderOutcome, ProviderWarning, RejectedValue,
    ResolutionMethod, ResolvedMetric, ScoreComponent, WarningKind,
};
pub use result::{FailureClass, Outcome, ProviderResult, ProviderStatus};
pub use types::{Metric, MetricClass, MetricSet, ProviderKind, SourceAuthority, Unit};
