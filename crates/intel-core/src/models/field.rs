use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Metric, ProviderKind, Unit};
use crate::parse::ParseOutcome;

/// A normalized datum value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

/// One normalized datum from one provider.
///
/// `confidence` is the provider's static reliability weight in `[0, 1]`,
/// not a statistical measure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderField {
    pub metric: Metric,
    pub value: FieldValue,
    pub unit: Unit,
    pub source: ProviderKind,
    pub fetched_at: DateTime<Utc>,
    pub confidence: f64,
}

impl ProviderField {
    /// Numeric field using the metric's natural unit.
    pub fn number(
        metric: Metric,
        value: f64,
        source: ProviderKind,
        fetched_at: DateTime<Utc>,
        confidence: f64,
    ) -> Self {
        Self {
            metric,
            value: FieldValue::Number(value),
            unit: metric.unit(),
            source,
            fetched_at,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn text(
        metric: Metric,
        value: impl Into<String>,
        source: ProviderKind,
        fetched_at: DateTime<Utc>,
        confidence: f64,
    ) -> Self {
        Self {
            metric,
            value: FieldValue::Text(value.into()),
            unit: Unit::Text,
            source,
            fetched_at,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Accumulates fields and parse diagnostics while a connector maps a payload.
///
/// Absent values are skipped rather than recorded, so a built field list never
/// contains a placeholder.
#[derive(Debug)]
pub struct FieldSink {
    source: ProviderKind,
    fetched_at: DateTime<Utc>,
    confidence: f64,
    fields: Vec<ProviderField>,
    notes: Vec<String>,
}

impl FieldSink {
    pub fn new(source: ProviderKind, fetched_at: DateTime<Utc>, confidence: f64) -> Self {
        Self {
            source,
            fetched_at,
            confidence,
            fields: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Push a numeric value if present. Later pushes for the same metric are ignored.
    pub fn number(&mut self, metric: Metric, value: Option<f64>) {
        if let Some(value) = value {
            if !self.contains(metric) {
                self.fields.push(ProviderField::number(
                    metric,
                    value,
                    self.source,
                    self.fetched_at,
                    self.confidence,
                ));
            }
        }
    }

    /// Push the outcome of the safe numeric parser. Ambiguous values become notes.
    pub fn parsed(&mut self, metric: Metric, outcome: ParseOutcome) {
        match outcome {
            ParseOutcome::Value(n) => self.number(metric, Some(n.value)),
            ParseOutcome::Absent => {}
            ParseOutcome::Ambiguous(reason) => self.note(metric, reason),
        }
    }

    pub fn text(&mut self, metric: Metric, value: Option<&str>) {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            if !self.contains(metric) {
                self.fields.push(ProviderField::text(
                    metric,
                    value,
                    self.source,
                    self.fetched_at,
                    self.confidence,
                ));
            }
        }
    }

    /// Record a diagnostic for a value that could not be interpreted.
    pub fn note(&mut self, metric: Metric, note: impl Into<String>) {
        self.notes.push(format!("{}: {}", metric, note.into()));
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.fields.iter().any(|f| f.metric == metric)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_parts(self) -> (Vec<ProviderField>, Vec<String>) {
        (self.fields, self.notes)
    }
}
