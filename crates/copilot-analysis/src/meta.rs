//! Ticker metadata lookup

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ticker::TickerValidator;

/// Descriptive metadata for a ticker
///
/// Only US equities are covered, so `asset_class` and `exchange` are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerMeta {
    pub asset_class: String,
    /// Input as given
    pub ticker: String,
    pub normalized_ticker: String,
    pub exchange: String,
    pub status: String,
}

impl TickerMeta {
    pub const ASSET_CLASS: &'static str = "stocks";
    pub const EXCHANGE: &'static str = "US";

    /// Resolve metadata for a raw ticker, validating it first
    pub fn resolve(raw: &str) -> Result<Self, ValidationError> {
        let ticker = TickerValidator::validate(raw)?;
        Ok(Self {
            asset_class: Self::ASSET_CLASS.to_string(),
            ticker: raw.to_string(),
            normalized_ticker: ticker.as_str().to_string(),
            exchange: Self::EXCHANGE.to_string(),
            status: "ok".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_normalizes() {
        let meta = TickerMeta::resolve(" brk.b").unwrap();
        assert_eq!(meta.ticker, " brk.b");
        assert_eq!(meta.normalized_ticker, "BRK.B");
        assert_eq!(meta.asset_class, "stocks");
        assert_eq!(meta.exchange, "US");
        assert_eq!(meta.status, "ok");
    }

    #[test]
    fn test_resolve_rejects_invalid() {
        assert_eq!(TickerMeta::resolve("  "), Err(ValidationError::Empty));
        assert!(TickerMeta::resolve("AA$PL").is_err());
    }

    #[test]
    fn test_serializes_flat() {
        let meta = TickerMeta::resolve("msft").unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["normalized_ticker"], "MSFT");
        assert_eq!(json["exchange"], "US");
    }
}
