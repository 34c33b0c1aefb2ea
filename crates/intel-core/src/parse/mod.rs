//! Safe numeric parsing of provider field values.
//!
//! Providers hand back numbers as JSON numbers, as strings with currency
//! symbols and thousands separators, as percentages, in accounting notation,
//! or as placeholders such as `"None"` and `"-"`. Everything here returns a
//! [`ParseOutcome`] and never panics. "Absent" and "zero" are distinct:
//! a placeholder never turns into `0.0`.

use serde_json::Value;

use crate::models::Unit;

/// Tokens providers use for "no value".
const ABSENT_TOKENS: &[&str] = &["n/a", "na", "-", "--", "none", "null", "nil", "nan", "."];

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// A successfully parsed number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParsedNumber {
    pub value: f64,
    /// Set to [`Unit::Ratio`] when the raw value was a percentage.
    pub unit_hint: Option<Unit>,
}

/// Result of interpreting one raw value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    Value(ParsedNumber),
    /// The provider explicitly had no value.
    Absent,
    /// The value exists but could not be interpreted confidently.
    Ambiguous(String),
}

impl ParseOutcome {
    /// The parsed value, if any. Absent and ambiguous both yield `None`.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(n) => Some(n.value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Scale a parsed value, e.g. millions to units. Non-values pass through.
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Self::Value(mut n) => {
                n.value *= factor;
                Self::Value(n)
            }
            other => other,
        }
    }

    /// Treat the value as a percentage expressed in whole points (12.3 means 12.3%).
    ///
    /// Values that already carried a `%` sign were divided when parsed and are left alone.
    pub fn percent_points(self) -> Self {
        match self {
            Self::Value(n) if n.unit_hint != Some(Unit::Ratio) => Self::Value(ParsedNumber {
                value: n.value / 100.0,
                unit_hint: Some(Unit::Ratio),
            }),
            other => other,
        }
    }
}

/// Parse an optional string field.
pub fn parse_opt(raw: Option<&str>) -> ParseOutcome {
    match raw {
        Some(s) => parse_str(s),
        None => ParseOutcome::Absent,
    }
}

/// Parse an arbitrary JSON value.
pub fn parse_json(raw: &Value) -> ParseOutcome {
    match raw {
        Value::Null => ParseOutcome::Absent,
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => ParseOutcome::Value(ParsedNumber {
                value: v,
                unit_hint: None,
            }),
            _ => ParseOutcome::Ambiguous(format!("non-finite number {}", n)),
        },
        Value::String(s) => parse_str(s),
        Value::Bool(b) => ParseOutcome::Ambiguous(format!("boolean {}", b)),
        Value::Array(_) | Value::Object(_) => {
            ParseOutcome::Ambiguous("structured value where a number was expected".to_string())
        }
    }
}

/// Parse a textual number.
///
/// Recognizes currency symbols, thousands separators, trailing `%`,
/// accounting negatives `(1,234.5)`, scientific notation and the
/// `K`/`M`/`B`/`T` magnitude suffixes.
pub fn parse_str(raw: &str) -> ParseOutcome {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Absent;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if ABSENT_TOKENS.contains(&lowered.as_str()) {
        return ParseOutcome::Absent;
    }

    let mut text: String = trimmed
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && !c.is_whitespace())
        .collect();
    if let Some(rest) = text.strip_prefix("USD") {
        text = rest.to_string();
    }

    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') && text.len() > 2 {
        negative = true;
        text = text[1..text.len() - 1].to_string();
    }

    let mut unit_hint = None;
    let mut scale = 1.0;
    if let Some(rest) = text.strip_suffix('%') {
        unit_hint = Some(Unit::Ratio);
        scale = 0.01;
        text = rest.to_string();
    } else if let Some(last) = text.chars().last() {
        let multiplier = match last {
            'K' => Some(1e3),
            'M' => Some(1e6),
            'B' => Some(1e9),
            'T' => Some(1e12),
            _ => None,
        };
        if let Some(multiplier) = multiplier {
            scale = multiplier;
            text.pop();
        }
    }

    let text = match strip_thousands(&text) {
        Some(t) => t,
        None => return ambiguous(raw, "misplaced thousands separator"),
    };

    if text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return ambiguous(raw, "not a number");
    }

    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            let mut value = v * scale;
            if negative {
                if value < 0.0 {
                    return ambiguous(raw, "double negative");
                }
                value = -value;
            }
            ParseOutcome::Value(ParsedNumber { value, unit_hint })
        }
        Ok(_) => ambiguous(raw, "non-finite"),
        Err(_) => ambiguous(raw, "not a number"),
    }
}

fn ambiguous(raw: &str, reason: &str) -> ParseOutcome {
    ParseOutcome::Ambiguous(format!("{} '{}'", reason, raw))
}

/// Remove `,` thousands separators, rejecting forms like `1,5` that may be decimal commas.
fn strip_thousands(text: &str) -> Option<String> {
    if !text.contains(',') {
        return Some(text.to_string());
    }
    let (int_part, frac_part) = match text.find('.') {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    };
    if frac_part.contains(',') {
        return None;
    }
    let digits = int_part.trim_start_matches(['-', '+']);
    let mut groups = digits.split(',');
    let head = groups.next()?;
    if head.is_empty() || head.len() > 3 {
        return None;
    }
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }
    Some(format!("{}{}", int_part.replace(',', ""), frac_part))
}
