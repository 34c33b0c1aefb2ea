//! Conflict resolution across providers reporting the same metric.
//!
//! Candidates are ranked by confidence, then source authority, then provider
//! order. The ranking is total, so the outcome never depends on the order in
//! which results arrived.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{
    FieldValue, Metric, ProviderField, ProviderWarning, RejectedValue, ResolutionMethod,
    ResolvedMetric, WarningKind,
};

/// Resolved metrics plus one note per metric the providers disagreed on.
#[derive(Debug, Default)]
pub struct Resolution {
    pub metrics: BTreeMap<Metric, ResolvedMetric>,
    pub conflicts: Vec<ProviderWarning>,
}

/// Resolve every metric present in at least one field.
pub fn resolve_fields<'a>(
    fields: impl IntoIterator<Item = &'a ProviderField>,
    tolerance: f64,
) -> Resolution {
    let mut grouped: BTreeMap<Metric, Vec<&ProviderField>> = BTreeMap::new();
    for field in fields {
        grouped.entry(field.metric).or_default().push(field);
    }

    let mut resolution = Resolution::default();
    for (metric, mut candidates) in grouped {
        candidates.sort_by(|a, b| rank(a, b));
        let (resolved, conflict) = resolve_metric(metric, &candidates, tolerance);
        resolution.metrics.insert(metric, resolved);
        resolution.conflicts.extend(conflict);
    }
    resolution
}

/// Best candidate first.
fn rank(a: &ProviderField, b: &ProviderField) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.source.authority().cmp(&a.source.authority()))
        .then_with(|| a.source.cmp(&b.source))
}

/// Whether every numeric value lies within `tolerance` of the largest magnitude.
pub fn within_tolerance(values: &[f64], tolerance: f64) -> bool {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if values.is_empty() {
        return true;
    }
    let scale = min.abs().max(max.abs());
    if scale == 0.0 {
        return true;
    }
    (max - min) <= tolerance * scale
}

fn resolve_metric(
    metric: Metric,
    ranked: &[&ProviderField],
    tolerance: f64,
) -> (ResolvedMetric, Option<ProviderWarning>) {
    let best = ranked[0];

    if ranked.len() == 1 {
        return (
            ResolvedMetric {
                value: best.value.clone(),
                unit: best.unit,
                method: ResolutionMethod::SingleSource,
                agreeing: vec![best.source],
                rejected: Vec::new(),
            },
            None,
        );
    }

    let numbers: Option<Vec<f64>> = ranked.iter().map(|f| f.value.as_number()).collect();
    let agreed = match &numbers {
        Some(values) => within_tolerance(values, tolerance),
        None => ranked.iter().all(|f| same_text(&f.value, &best.value)),
    };

    if agreed {
        let mut agreeing: Vec<_> = ranked.iter().map(|f| f.source).collect();
        agreeing.sort();
        let (value, method) = match numbers {
            Some(_) => (
                FieldValue::Number(weighted_mean(ranked)),
                ResolutionMethod::WeightedMean,
            ),
            None => (best.value.clone(), ResolutionMethod::Unanimous),
        };
        return (
            ResolvedMetric {
                value,
                unit: best.unit,
                method,
                agreeing,
                rejected: Vec::new(),
            },
            None,
        );
    }

    let rejected: Vec<RejectedValue> = ranked[1..]
        .iter()
        .filter(|f| !same_value(&f.value, &best.value))
        .map(|f| RejectedValue {
            provider: f.source,
            value: f.value.clone(),
            confidence: f.confidence,
        })
        .collect();
    let mut agreeing: Vec<_> = ranked
        .iter()
        .filter(|f| same_value(&f.value, &best.value))
        .map(|f| f.source)
        .collect();
    agreeing.sort();

    let outvoted = rejected
        .iter()
        .map(|r| format!("{}={} (confidence {:.2})", r.provider, display(&r.value), r.confidence))
        .collect::<Vec<_>>()
        .join(", ");
    let warning = ProviderWarning {
        provider: best.source,
        kind: WarningKind::ConflictUnresolvedNote,
        metric: Some(metric),
        message: format!(
            "{}: kept {}={} (confidence {:.2}) over {}",
            metric,
            best.source,
            display(&best.value),
            best.confidence,
            outvoted
        ),
    };

    (
        ResolvedMetric {
            value: best.value.clone(),
            unit: best.unit,
            method: ResolutionMethod::HighestConfidence,
            agreeing,
            rejected,
        },
        Some(warning),
    )
}

/// Confidence-weighted mean, summed in provider order so the float result is reproducible.
fn weighted_mean(fields: &[&ProviderField]) -> f64 {
    let mut ordered: Vec<&ProviderField> = fields.to_vec();
    ordered.sort_by_key(|f| f.source);

    let weight: f64 = ordered.iter().map(|f| f.confidence).sum();
    let values = ordered.iter().filter_map(|f| f.value.as_number().map(|v| (v, f.confidence)));
    if weight <= 0.0 {
        let (sum, n) = values.fold((0.0, 0usize), |(s, n), (v, _)| (s + v, n + 1));
        return sum / n.max(1) as f64;
    }
    values.map(|(v, c)| v * c).sum::<f64>() / weight
}

fn same_text(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_text(), b.as_text()) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

fn same_value(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
        _ => same_text(a, b),
    }
}

fn display(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Text(s) => format!("'{}'", s),
    }
}
