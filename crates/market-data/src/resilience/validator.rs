//! Sanity checks applied to upstream payloads before they are cached.
//!
//! A payload that fails a hard check is rejected with
//! [`MarketDataError::ValidationFailed`], which the service treats like any
//! other upstream failure (retried for flaky sources, never cached). Soft
//! issues are logged and the payload is accepted.

use chrono::NaiveDate;
use log::warn;

use crate::errors::MarketDataError;
use crate::models::{CompanyInfo, NewsItem, OptionChain, PriceBar, StockQuote};

/// Upper sanity bound for any price.
const MAX_PRICE: f64 = 1_000_000_000.0;

/// A payload that can be checked before it is accepted.
pub trait Validate {
    fn validate(&self) -> Result<(), MarketDataError>;
}

fn check_price(label: &str, value: f64) -> Result<(), MarketDataError> {
    if !value.is_finite() {
        return Err(MarketDataError::validation(format!(
            "{} is not a finite number",
            label
        )));
    }
    if value <= 0.0 {
        return Err(MarketDataError::validation(format!(
            "{} must be positive, got {}",
            label, value
        )));
    }
    Ok(())
}

impl Validate for StockQuote {
    fn validate(&self) -> Result<(), MarketDataError> {
        check_price("Quote price", self.price)?;

        if self.price > MAX_PRICE {
            warn!(
                "Quote validation warning for {}: price {} exceeds sanity threshold",
                self.symbol, self.price
            );
        }
        if self.volume == 0 {
            warn!(
                "Quote validation warning for {}: zero volume (market may be closed)",
                self.symbol
            );
        }
        Ok(())
    }
}

impl Validate for Vec<PriceBar> {
    fn validate(&self) -> Result<(), MarketDataError> {
        if !self.iter().any(|bar| bar.close.is_finite() && bar.close > 0.0) {
            return Err(MarketDataError::validation(
                "History contains no bar with a positive close",
            ));
        }

        let inverted = self.iter().filter(|bar| bar.high < bar.low).count();
        if inverted > 0 {
            warn!(
                "History validation warning: {} bar(s) with high below low",
                inverted
            );
        }
        Ok(())
    }
}

impl Validate for OptionChain {
    fn validate(&self) -> Result<(), MarketDataError> {
        if self.is_empty() {
            return Err(MarketDataError::validation(format!(
                "Option chain for {} has no contracts",
                self.symbol
            )));
        }
        if !self.underlying_price.is_finite() || self.underlying_price < 0.0 {
            warn!(
                "Option chain validation warning for {}: bad underlying price {}",
                self.symbol, self.underlying_price
            );
        }
        Ok(())
    }
}

impl Validate for CompanyInfo {
    fn validate(&self) -> Result<(), MarketDataError> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err(MarketDataError::validation(format!(
                "Company info for {} has no name",
                self.symbol
            ))),
        }
    }
}

// An empty headline or expiration list is a legitimate answer.
impl Validate for Vec<NewsItem> {
    fn validate(&self) -> Result<(), MarketDataError> {
        Ok(())
    }
}

impl Validate for Vec<NaiveDate> {
    fn validate(&self) -> Result<(), MarketDataError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64) -> PriceBar {
        PriceBar {
            date: "2026-01-02".to_string(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100,
        }
    }

    #[test]
    fn test_quote_price_checks() {
        assert!(StockQuote::from_prices("AAPL", None, 190.0, Some(188.0), 10)
            .validate()
            .is_ok());
        assert!(StockQuote::from_prices("AAPL", None, 0.0, None, 10)
            .validate()
            .is_err());
        assert!(StockQuote::from_prices("AAPL", None, -3.0, None, 10)
            .validate()
            .is_err());
        assert!(StockQuote::from_prices("AAPL", None, f64::NAN, None, 10)
            .validate()
            .is_err());
    }

    #[test]
    fn test_zero_volume_is_only_a_warning() {
        let quote = StockQuote::from_prices("AAPL", None, 190.0, None, 0);
        assert!(quote.validate().is_ok());
    }

    #[test]
    fn test_history_needs_a_positive_close() {
        assert!(Vec::<PriceBar>::new().validate().is_err());
        assert!(vec![bar(0.0)].validate().is_err());
        assert!(vec![bar(0.0), bar(12.5)].validate().is_ok());
    }

    #[test]
    fn test_company_info_needs_name() {
        assert!(CompanyInfo::with_name("AAPL", "Apple Inc.").validate().is_ok());
        assert!(CompanyInfo::with_name("AAPL", "  ").validate().is_err());
        assert!(CompanyInfo::default().validate().is_err());
    }

    #[test]
    fn test_empty_chain_rejected() {
        let chain = OptionChain {
            symbol: "AAPL".to_string(),
            expiration: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            underlying_price: 190.0,
            calls: vec![],
            puts: vec![],
            is_mock: false,
        };
        assert!(matches!(
            chain.validate(),
            Err(MarketDataError::ValidationFailed { .. })
        ));
    }
}
