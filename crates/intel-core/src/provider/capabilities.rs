//! What a connector can contribute to a profile.

use crate::models::{Metric, MetricSet};

/// Describes the capabilities of a connector.
///
/// Used by the aggregator to decide which connectors to dispatch for a
/// requested metric set.
#[derive(Clone, Debug)]
pub struct ConnectorCapabilities {
    /// Metrics this connector can produce.
    pub metrics: &'static [Metric],

    /// Whether every call needs an API credential.
    pub requires_credential: bool,
}

impl ConnectorCapabilities {
    pub fn supports(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }

    /// The part of `requested` this connector can serve. Empty means "do not dispatch".
    pub fn applicable(&self, requested: &MetricSet) -> MetricSet {
        requested
            .iter()
            .copied()
            .filter(|m| self.supports(*m))
            .collect()
    }
}
