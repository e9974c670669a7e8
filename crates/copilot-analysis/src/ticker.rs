//! Ticker normalization and validation

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum symbol length, not counting a class suffix
pub const MAX_SYMBOL_LEN: usize = 5;

/// Maximum class-share suffix length (the `A` in `BRK.A`)
pub const MAX_SUFFIX_LEN: usize = 2;

/// Canonical, validated stock ticker
///
/// Always trimmed and uppercased; once built it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse and normalize a raw ticker, see [`TickerValidator::validate`]
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        TickerValidator::validate(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol part without any class suffix
    pub fn symbol(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Class-share suffix, if any
    pub fn class_suffix(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, suffix)| suffix)
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Ticker {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Ticker {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

/// Stateless ticker validator
///
/// Rejects rather than repairs: invalid characters are an error, never
/// silently dropped.
pub struct TickerValidator;

impl TickerValidator {
    /// Trim, uppercase and validate a raw ticker string
    ///
    /// Accepts 1-5 ASCII letters/digits, optionally followed by a single dot
    /// and a 1-2 character class suffix (`BRK.A`).
    pub fn validate(raw: &str) -> Result<Ticker, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }

        let normalized = trimmed.to_ascii_uppercase();

        let mut dots = 0;
        for (index, ch) in normalized.chars().enumerate() {
            if ch == '.' {
                dots += 1;
                continue;
            }
            if !(ch.is_ascii_uppercase() || ch.is_ascii_digit()) {
                return Err(ValidationError::InvalidChar { ch, index });
            }
        }
        if dots > 1 {
            return Err(ValidationError::MultipleDots);
        }

        let (symbol, suffix) = match normalized.split_once('.') {
            Some((symbol, suffix)) => (symbol, Some(suffix)),
            None => (normalized.as_str(), None),
        };

        if symbol.is_empty() || suffix.is_some_and(str::is_empty) {
            return Err(ValidationError::MisplacedDot);
        }

        if symbol.len() > MAX_SYMBOL_LEN {
            return Err(ValidationError::TooLong {
                len: symbol.len(),
                max: MAX_SYMBOL_LEN,
            });
        }

        if let Some(suffix) = suffix {
            if suffix.len() > MAX_SUFFIX_LEN {
                return Err(ValidationError::SuffixTooLong {
                    len: suffix.len(),
                    max: MAX_SUFFIX_LEN,
                });
            }
        }

        Ok(Ticker(normalized))
    }
}
