use serde::{Deserialize, Serialize};

/// Real-time quote for a single symbol
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuote {
    /// Normalized (uppercase) symbol
    pub symbol: String,

    /// Long or short company name, when the provider knows it
    pub name: Option<String>,

    /// Last traded price
    pub price: f64,

    /// Absolute change against the previous close
    pub change: f64,

    /// Percent change against the previous close
    pub change_percent: f64,

    /// Session volume
    pub volume: u64,
}

impl StockQuote {
    /// Build a quote from the last price and the previous close.
    ///
    /// A missing or zero previous close yields a zero change.
    pub fn from_prices(
        symbol: impl Into<String>,
        name: Option<String>,
        price: f64,
        previous_close: Option<f64>,
        volume: u64,
    ) -> Self {
        let (change, change_percent) = match previous_close {
            Some(prev) if prev != 0.0 => {
                let change = price - prev;
                (change, change / prev * 100.0)
            }
            _ => (0.0, 0.0),
        };

        Self {
            symbol: symbol.into(),
            name,
            price,
            change,
            change_percent,
            volume,
        }
    }
}

/// One OHLCV bar of price history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Bar date formatted as `YYYY-MM-DD`
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}
