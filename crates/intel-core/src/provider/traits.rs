//! Connector trait definitions.
//!
//! This module defines the `Connector` trait that every external data
//! source implements.

use async_trait::async_trait;
use log::{debug, warn};

use crate::errors::ProviderError;
use crate::models::{CompanyKey, FieldSink, MetricSet, ProviderKind, ProviderResult};

use super::capabilities::ConnectorCapabilities;

/// Trait for external data connectors.
///
/// A connector owns one provider's request shape, rate-limit handle and
/// payload mapping. It never returns an error: every failure is folded into
/// the returned [`ProviderResult`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use signal_intel_core::provider::{Connector, ConnectorCapabilities};
///
/// struct MyConnector;
///
/// #[async_trait]
/// impl Connector for MyConnector {
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::GitHub
///     }
///
///     fn capabilities(&self) -> ConnectorCapabilities {
///         ConnectorCapabilities {
///             metrics: &[Metric::CodeStars],
///             requires_credential: false,
///         }
///     }
///
///     async fn fetch(&self, company: &CompanyKey, metrics: &MetricSet) -> ProviderResult {
///         // ... call the provider and map its payload
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Which provider this connector talks to.
    fn kind(&self) -> ProviderKind;

    /// Stable identifier used in logs.
    fn id(&self) -> &'static str {
        self.kind().id()
    }

    /// Static reliability weight stamped on every field.
    fn confidence(&self) -> f64 {
        0.5
    }

    /// Describes what this connector can produce.
    fn capabilities(&self) -> ConnectorCapabilities;

    /// Fetch the requested metrics for one company.
    ///
    /// `metrics` is already narrowed to what [`Connector::capabilities`]
    /// supports. Fields outside it must not be returned.
    async fn fetch(&self, company: &CompanyKey, metrics: &MetricSet) -> ProviderResult;
}

/// Fold a connector's internal outcome into a `ProviderResult`.
///
/// Fields outside `requested` are dropped here so each connector can map
/// its whole payload without filtering.
pub fn finish(
    provider: ProviderKind,
    company: &CompanyKey,
    requested: &MetricSet,
    outcome: Result<FieldSink, ProviderError>,
) -> ProviderResult {
    match outcome {
        Ok(sink) => {
            let (fields, notes) = sink.into_parts();
            let fields: Vec<_> = fields
                .into_iter()
                .filter(|f| requested.contains(&f.metric))
                .collect();
            debug!(
                "{} returned {} field(s) for {} ({} note(s))",
                provider,
                fields.len(),
                company,
                notes.len()
            );
            ProviderResult::success(provider, fields, notes)
        }
        Err(error) => {
            warn!("{} failed for {}: {}", provider, company, error);
            ProviderResult::from_error(provider, &error)
        }
    }
}
