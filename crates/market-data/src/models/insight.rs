use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One model output fed into a market analysis.
///
/// `prediction` runs from -1 (strongly bearish) to 1 (strongly bullish);
/// `confidence` from 0 to 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub symbol: String,
    #[serde(default)]
    pub prediction: f64,
    #[serde(default)]
    pub confidence: f64,
}

/// Body of an analysis request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub symbols: Vec<String>,
    #[serde(default, alias = "predictions")]
    pub rl_predictions: Vec<ModelPrediction>,
    #[serde(default)]
    pub analysis_type: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
}

/// Shared high/medium/low scale for volatility, risk, impact and priority.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    Momentum,
    DipBuying,
    MeanReversion,
    Breakout,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub sentiment: Sentiment,
    pub volatility: Level,
    pub trend: Trend,
    pub key_events: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradingOpportunity {
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: OpportunityKind,
    pub confidence: f64,
    pub reasoning: String,
    pub risk_level: Level,
    pub time_horizon: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub impact: Level,
    pub description: String,
    pub mitigation: String,
}

/// Portfolio-level action suggested by an analysis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub action: String,
    pub reasoning: String,
    pub priority: Level,
    pub timeframe: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    pub market_context: MarketContext,
    pub opportunities: Vec<TradingOpportunity>,
    pub risk_factors: Vec<RiskFactor>,
    pub recommendations: Vec<ActionItem>,
}

/// Market analysis response.
///
/// The top-level lists are summaries (symbols, factor names, actions) of the
/// records in `detailed_analysis`. Field names are snake_case on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub market_context: Sentiment,
    pub opportunities: Vec<String>,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    pub detailed_analysis: DetailedAnalysis,
}

impl MarketAnalysis {
    pub fn new(detail: DetailedAnalysis, reasoning: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            market_context: detail.market_context.sentiment,
            opportunities: detail.opportunities.iter().map(|o| o.symbol.clone()).collect(),
            risk_factors: detail.risk_factors.iter().map(|r| r.factor.clone()).collect(),
            recommendations: detail.recommendations.iter().map(|r| r.action.clone()).collect(),
            reasoning,
            timestamp,
            detailed_analysis: detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_frontend_payload() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "symbols": ["AAPL", "MSFT"],
            "market_data": {"AAPL": {"price": 190.0}},
            "rl_predictions": [
                {"symbol": "AAPL", "prediction": 0.6, "confidence": 0.8,
                 "features": {"feature_1": 0.1}, "timestamp": "2026-10-17T12:00:00Z"}
            ],
            "analysis_type": "trading_opportunities"
        }))
        .unwrap();

        assert_eq!(request.symbols.len(), 2);
        assert_eq!(request.rl_predictions[0].prediction, 0.6);
        assert_eq!(request.analysis_type.as_deref(), Some("trading_opportunities"));
    }

    #[test]
    fn test_opportunity_kind_wire_name() {
        assert_eq!(
            serde_json::to_value(OpportunityKind::DipBuying).unwrap(),
            json!("dip_buying")
        );
        assert_eq!(serde_json::to_value(Level::High).unwrap(), json!("high"));
    }
}
