use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::IntelError;

/// Immutable company identity shared by every provider.
///
/// The ticker is the join key across providers and is always stored
/// upper-cased. CIK and legal name are optional hints some providers need.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCompanyKey")]
pub struct CompanyKey {
    ticker: String,
    cik: Option<String>,
    name: Option<String>,
}

/// Wire form of [`CompanyKey`]; deserialization runs the same checks as the constructors.
#[derive(Deserialize)]
struct RawCompanyKey {
    ticker: String,
    #[serde(default)]
    cik: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<RawCompanyKey> for CompanyKey {
    type Error = IntelError;

    fn try_from(raw: RawCompanyKey) -> Result<Self, Self::Error> {
        let mut key = Self::new(&raw.ticker)?;
        if let Some(cik) = raw.cik {
            key = key.with_cik(&cik)?;
        }
        if let Some(name) = raw.name {
            key = key.with_name(&name);
        }
        Ok(key)
    }
}

impl CompanyKey {
    /// Create a key from a ticker symbol.
    ///
    /// # Errors
    ///
    /// Returns [`IntelError::InvalidCompanyKey`] if the ticker is empty or
    /// contains characters no exchange uses.
    pub fn new(ticker: &str) -> Result<Self, IntelError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(IntelError::InvalidCompanyKey("ticker is empty".to_string()));
        }
        if ticker.len() > 12 {
            return Err(IntelError::InvalidCompanyKey(format!(
                "ticker too long: {}",
                ticker
            )));
        }
        if !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(IntelError::InvalidCompanyKey(format!(
                "ticker has invalid characters: {}",
                ticker
            )));
        }

        Ok(Self {
            ticker,
            cik: None,
            name: None,
        })
    }

    /// Attach an SEC Central Index Key. Leading zeros are dropped.
    pub fn with_cik(mut self, cik: &str) -> Result<Self, IntelError> {
        let trimmed = cik.trim();
        if trimmed.is_empty() || trimmed.len() > 10 || !trimmed.chars().all(|c| c.is_ascii_digit())
        {
            return Err(IntelError::InvalidCompanyKey(format!("invalid CIK: {}", cik)));
        }
        let stripped = trimmed.trim_start_matches('0');
        self.cik = Some(if stripped.is_empty() { "0" } else { stripped }.to_string());
        Ok(self)
    }

    /// Attach the company's legal name.
    pub fn with_name(mut self, name: &str) -> Self {
        let name = name.trim();
        self.name = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        self
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn cik(&self) -> Option<&str> {
        self.cik.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// CIK in the zero-padded 10 digit form EDGAR URLs expect.
    pub fn padded_cik(&self) -> Option<String> {
        self.cik.as_ref().map(|cik| format!("{:0>10}", cik))
    }

    /// Re-run the constructor checks on an existing key.
    pub fn validate(&self) -> Result<(), IntelError> {
        let checked = Self::new(&self.ticker)?;
        if checked.ticker != self.ticker {
            return Err(IntelError::InvalidCompanyKey(format!(
                "ticker not normalized: {}",
                self.ticker
            )));
        }
        if let Some(cik) = &self.cik {
            checked.with_cik(cik)?;
        }
        Ok(())
    }

    /// Best human-readable search term: legal name if known, else ticker.
    pub fn search_term(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ticker)
    }
}

impl fmt::Display for CompanyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cik {
            Some(cik) => write!(f, "{} (CIK {})", self.ticker, cik),
            None => f.write_str(&self.ticker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_is_uppercased_and_trimmed() {
        let key = CompanyKey::new("  aapl ").unwrap();
        assert_eq!(key.ticker(), "AAPL");
    }

    #[test]
    fn test_empty_ticker_rejected() {
        assert!(matches!(
            CompanyKey::new("   "),
            Err(IntelError::InvalidCompanyKey(_))
        ));
    }

    #[test]
    fn test_invalid_characters_rejected() {
        assert!(CompanyKey::new("AA PL").is_err());
        assert!(CompanyKey::new("AAPL;DROP").is_err());
        assert!(CompanyKey::new("BRK.B").is_ok());
    }

    #[test]
    fn test_cik_padding() {
        let key = CompanyKey::new("AAPL").unwrap().with_cik("0000320193").unwrap();
        assert_eq!(key.cik(), Some("320193"));
        assert_eq!(key.padded_cik().as_deref(), Some("0000320193"));
    }

    #[test]
    fn test_invalid_cik_rejected() {
        let key = CompanyKey::new("AAPL").unwrap();
        assert!(key.clone().with_cik("32x193").is_err());
        assert!(key.with_cik("").is_err());
    }

    #[test]
    fn test_search_term_prefers_name() {
        let key = CompanyKey::new("AAPL").unwrap();
        assert_eq!(key.search_term(), "AAPL");
        let key = key.with_name("Apple Inc.");
        assert_eq!(key.search_term(), "Apple Inc.");
    }

    #[test]
    fn test_deserialize_validates_like_new() {
        let key: CompanyKey =
            serde_json::from_str(r#"{"ticker":" aapl ","cik":"0000320193","name":"Apple Inc."}"#)
                .unwrap();
        assert_eq!(key.ticker(), "AAPL");
        assert_eq!(key.cik(), Some("320193"));
        assert!(key.validate().is_ok());

        let roundtrip: CompanyKey = serde_json::from_str(&serde_json::to_string(&key).unwrap()).unwrap();
        assert_eq!(roundtrip, key);

        assert!(serde_json::from_str::<CompanyKey>(r#"{"ticker":""}"#).is_err());
        assert!(serde_json::from_str::<CompanyKey>(r#"{"ticker":"aapl; drop"}"#).is_err());
        assert!(serde_json::from_str::<CompanyKey>(r#"{"ticker":"AAPL","cik":"abc"}"#).is_err());
    }
}
