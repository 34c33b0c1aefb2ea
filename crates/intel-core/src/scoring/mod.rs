//! Composite intelligence score.
//!
//! A fixed weighting over five metrics, each mapped onto `[0, 1]` first:
//!
//! | Metric               | Weight | Normalization                         |
//! |----------------------|--------|---------------------------------------|
//! | `revenue_growth`     | 0.30   | clamp to [-50%, +100%], min-max       |
//! | `market_cap`         | 0.25   | log10, clamp to [$1M, ~$3T], min-max  |
//! | `sentiment_polarity` | 0.15   | [-1, 1] shifted onto [0, 1]           |
//! | `funding_momentum`   | 0.15   | already a share, clamped              |
//! | `code_momentum`      | 0.15   | already a share, clamped              |
//!
//! Missing metrics drop out and the remaining weights are renormalized.
//! Below the minimum metric count no score is produced.

use std::collections::BTreeMap;

use crate::config::DEFAULT_MIN_SCORED_METRICS;
use crate::models::{CompositeScore, Metric, ResolvedMetric, ScoreComponent};

/// Weights over the scored metrics. Sum to 1.
pub const SCORE_WEIGHTS: [(Metric, f64); 5] = [
    (Metric::RevenueGrowth, 0.30),
    (Metric::MarketCap, 0.25),
    (Metric::SentimentPolarity, 0.15),
    (Metric::FundingMomentum, 0.15),
    (Metric::CodeMomentum, 0.15),
];

const GROWTH_FLOOR: f64 = -0.5;
const GROWTH_CEILING: f64 = 1.0;
const LOG_CAP_FLOOR: f64 = 6.0;
const LOG_CAP_CEILING: f64 = 12.5;

/// Folds resolved metrics into a 0-100 score.
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    min_metrics: usize,
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCORED_METRICS)
    }
}

impl CompositeScorer {
    pub fn new(min_metrics: usize) -> Self {
        Self {
            min_metrics: min_metrics.max(1),
        }
    }

    /// Score the resolved metrics, or `None` when too few scored metrics are present.
    pub fn score(&self, metrics: &BTreeMap<Metric, ResolvedMetric>) -> Option<CompositeScore> {
        let present: Vec<(Metric, f64, f64)> = SCORE_WEIGHTS
            .iter()
            .filter_map(|(metric, weight)| {
                let raw = metrics.get(metric)?.number()?;
                normalize(*metric, raw).map(|n| (*metric, n, *weight))
            })
            .collect();

        if present.len() < self.min_metrics {
            return None;
        }

        let total_weight: f64 = present.iter().map(|(_, _, w)| w).sum();
        if total_weight <= 0.0 {
            return None;
        }

        let components: Vec<ScoreComponent> = present
            .into_iter()
            .map(|(metric, normalized, weight)| ScoreComponent {
                metric,
                normalized,
                weight: weight / total_weight,
            })
            .collect();
        let value = 100.0
            * components
                .iter()
                .map(|c| c.normalized * c.weight)
                .sum::<f64>();

        Some(CompositeScore {
            value: value.clamp(0.0, 100.0),
            components,
        })
    }
}

/// Map a raw metric value onto `[0, 1]`. `None` for metrics that are not scored
/// or values that cannot be placed on the scale.
pub fn normalize(metric: Metric, raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    let n = match metric {
        Metric::RevenueGrowth => {
            (raw.clamp(GROWTH_FLOOR, GROWTH_CEILING) - GROWTH_FLOOR)
                / (GROWTH_CEILING - GROWTH_FLOOR)
        }
        Metric::MarketCap => {
            if raw <= 0.0 {
                0.0
            } else {
                (raw.log10().clamp(LOG_CAP_FLOOR, LOG_CAP_CEILING) - LOG_CAP_FLOOR)
                    / (LOG_CAP_CEILING - LOG_CAP_FLOOR)
            }
        }
        Metric::SentimentPolarity => (raw.clamp(-1.0, 1.0) + 1.0) / 2.0,
        Metric::FundingMomentum | Metric::CodeMomentum => raw.clamp(0.0, 1.0),
        _ => return None,
    };
    Some(n)
}
