use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::field::ProviderField;
use super::types::ProviderKind;
use crate::errors::{ErrorClass, ProviderError};

/// Coarse status of a connector invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Success,
    Failure,
    RateLimited,
}

/// Why a connector failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureClass {
    /// No terminal outcome within the per-provider timeout or caller deadline.
    Timeout,
    /// Network or 5xx failure that survived every retry.
    Transient,
    /// Bad input, auth, schema mismatch or unknown company.
    Permanent,
}

/// Terminal outcome of one connector call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        fields: Vec<ProviderField>,
        /// Parse diagnostics for values that were dropped as ambiguous.
        notes: Vec<String>,
    },
    Failure {
        class: FailureClass,
        message: String,
    },
    RateLimited {
        retry_after: Option<Duration>,
    },
}

/// Immutable result of one connector invocation for one company.
///
/// Only constructible through the associated functions, which guarantee
/// a `Success` always carries at least one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    provider: ProviderKind,
    outcome: Outcome,
}

impl ProviderResult {
    /// Successful result. An empty field list is downgraded to a permanent failure.
    pub fn success(provider: ProviderKind, fields: Vec<ProviderField>, notes: Vec<String>) -> Self {
        if fields.is_empty() {
            let mut message = "provider returned no usable fields".to_string();
            if !notes.is_empty() {
                message = format!("{} ({})", message, notes.join("; "));
            }
            return Self::failure(provider, FailureClass::Permanent, message);
        }

        Self {
            provider,
            outcome: Outcome::Success { fields, notes },
        }
    }

    pub fn failure(provider: ProviderKind, class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            provider,
            outcome: Outcome::Failure {
                class,
                message: message.into(),
            },
        }
    }

    pub fn timeout(provider: ProviderKind, after: Duration) -> Self {
        Self::failure(
            provider,
            FailureClass::Timeout,
            format!("no response within {} ms", after.as_millis()),
        )
    }

    pub fn rate_limited(provider: ProviderKind, retry_after: Option<Duration>) -> Self {
        Self {
            provider,
            outcome: Outcome::RateLimited { retry_after },
        }
    }

    /// Fold a connector error into a result. Errors never cross the connector boundary.
    pub fn from_error(provider: ProviderKind, error: &ProviderError) -> Self {
        match error.class() {
            ErrorClass::RateLimited { retry_after } => Self::rate_limited(provider, retry_after),
            ErrorClass::Timeout => Self::failure(provider, FailureClass::Timeout, error.to_string()),
            ErrorClass::Transient => {
                Self::failure(provider, FailureClass::Transient, error.to_string())
            }
            ErrorClass::Permanent => {
                Self::failure(provider, FailureClass::Permanent, error.to_string())
            }
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn status(&self) -> ProviderStatus {
        match self.outcome {
            Outcome::Success { .. } => ProviderStatus::Success,
            Outcome::Failure { .. } => ProviderStatus::Failure,
            Outcome::RateLimited { .. } => ProviderStatus::RateLimited,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Fields of a successful result, empty otherwise.
    pub fn fields(&self) -> &[ProviderField] {
        match &self.outcome {
            Outcome::Success { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn notes(&self) -> &[String] {
        match &self.outcome {
            Outcome::Success { notes, .. } => notes,
            _ => &[],
        }
    }
}
