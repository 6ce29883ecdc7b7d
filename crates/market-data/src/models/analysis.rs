use serde::{Deserialize, Serialize};

use super::options::OptionContract;

/// Trend signal derived from moving averages
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    Unavailable,
}

/// SMA-crossover trade recommendation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecommendation {
    pub signal: Signal,
    pub summary: String,

    /// 0..=100
    pub confidence: f64,
    pub current_price: f64,
    pub sma50: f64,
    pub sma200: f64,
}

impl TradeRecommendation {
    pub fn unavailable(summary: impl Into<String>) -> Self {
        Self {
            signal: Signal::Unavailable,
            summary: summary.into(),
            confidence: 0.0,
            current_price: 0.0,
            sma50: 0.0,
            sma200: 0.0,
        }
    }
}

/// Options strategy suggested from the trade signal
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OptionsStrategy {
    #[serde(rename = "Long Call")]
    LongCall,
    #[serde(rename = "Long Put")]
    LongPut,
    #[serde(rename = "NEUTRAL")]
    Neutral,
    #[serde(rename = "UNAVAILABLE")]
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsRecommendation {
    pub strategy: OptionsStrategy,
    pub summary: String,
    pub contract: Option<OptionContract>,
    pub confidence: f64,
}

impl OptionsRecommendation {
    pub fn unavailable(summary: impl Into<String>) -> Self {
        Self {
            strategy: OptionsStrategy::Unavailable,
            summary: summary.into(),
            contract: None,
            confidence: 0.0,
        }
    }

    pub fn neutral() -> Self {
        Self {
            strategy: OptionsStrategy::Neutral,
            summary: "Market conditions are neutral. No clear options strategy is recommended."
                .to_string(),
            contract: None,
            confidence: 50.0,
        }
    }
}

/// Daily performance of one market sector, tracked through its sector ETF
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorPerformance {
    pub sector: String,
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_wire_format() {
        assert_eq!(serde_json::to_value(Signal::Buy).unwrap(), "BUY");
        assert_eq!(
            serde_json::to_value(Signal::Unavailable).unwrap(),
            "UNAVAILABLE"
        );
    }

    #[test]
    fn test_strategy_wire_format() {
        assert_eq!(
            serde_json::to_value(OptionsStrategy::LongCall).unwrap(),
            "Long Call"
        );
        assert_eq!(
            serde_json::to_value(OptionsRecommendation::neutral()).unwrap()["strategy"],
            "NEUTRAL"
        );
    }
}
