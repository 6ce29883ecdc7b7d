//! Portfolio-level market analysis from model predictions.
//!
//! Everything here is a pure function of the request and of sector data the
//! service already holds; nothing is fetched.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};

use crate::models::{
    ActionItem, AnalysisRequest, DetailedAnalysis, Level, MarketAnalysis, MarketContext,
    ModelPrediction, OpportunityKind, RiskFactor, Sentiment, TradingOpportunity, Trend,
};

/// Most symbols accepted in one analysis request.
pub const MAX_ANALYSIS_SYMBOLS: usize = 50;

const SIGNAL_THRESHOLD: f64 = 0.3;
const STRONG_SIGNAL_THRESHOLD: f64 = 0.5;
const TREND_THRESHOLD: f64 = 0.2;
const OPPORTUNITY_MIN_CONFIDENCE: f64 = 0.7;
const HIGH_CONFIDENCE: f64 = 0.8;
const LOW_CONFIDENCE: f64 = 0.6;
const MIN_DIVERSIFIED_POSITIONS: usize = 5;
const MAX_SECTOR_WEIGHT: f64 = 0.4;
const OPPORTUNITY_HORIZON: &str = "1-3 days";

fn usable(predictions: &[ModelPrediction]) -> impl Iterator<Item = &ModelPrediction> {
    predictions
        .iter()
        .filter(|p| p.prediction.is_finite() && p.confidence.is_finite())
}

pub fn sentiment(predictions: &[ModelPrediction]) -> Sentiment {
    let (bullish, bearish) = usable(predictions).fold((0, 0), |(up, down), p| {
        if p.prediction > SIGNAL_THRESHOLD {
            (up + 1, down)
        } else if p.prediction < -SIGNAL_THRESHOLD {
            (up, down + 1)
        } else {
            (up, down)
        }
    });

    match bullish.cmp(&bearish) {
        std::cmp::Ordering::Greater => Sentiment::Bullish,
        std::cmp::Ordering::Less => Sentiment::Bearish,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

/// Dispersion of the predictions: population standard deviation of at
/// least two values, bucketed at 0.25 and 0.5.
pub fn volatility(predictions: &[ModelPrediction]) -> Level {
    let values: Vec<f64> = usable(predictions).map(|p| p.prediction).collect();
    if values.len() < 2 {
        return Level::Medium;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let spread = variance.sqrt();

    if spread >= 0.5 {
        Level::High
    } else if spread >= 0.25 {
        Level::Medium
    } else {
        Level::Low
    }
}

pub fn trend(predictions: &[ModelPrediction]) -> Trend {
    let values: Vec<f64> = usable(predictions).map(|p| p.prediction).collect();
    if values.is_empty() {
        return Trend::Sideways;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean > TREND_THRESHOLD {
        Trend::Uptrend
    } else if mean < -TREND_THRESHOLD {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

fn low_confidence_majority(predictions: &[ModelPrediction]) -> bool {
    let total = usable(predictions).count();
    let low = usable(predictions)
        .filter(|p| p.confidence < LOW_CONFIDENCE)
        .count();
    low * 2 > total
}

fn key_events(predictions: &[ModelPrediction]) -> Vec<String> {
    let mut events = Vec::new();

    let (mut up, mut down) = (0, 0);
    for p in usable(predictions) {
        if p.prediction > SIGNAL_THRESHOLD {
            up += 1;
        } else if p.prediction < -SIGNAL_THRESHOLD {
            down += 1;
        }
    }
    let total = usable(predictions).count();
    if total > 0 {
        events.push(format!(
            "{} bullish / {} bearish / {} neutral model signals",
            up,
            down,
            total - up - down
        ));
    }

    if let Some(strongest) = usable(predictions)
        .max_by(|a, b| a.prediction.abs().total_cmp(&b.prediction.abs()))
        .filter(|p| p.prediction.abs() > SIGNAL_THRESHOLD)
    {
        events.push(format!(
            "Strongest signal: {} ({:+.2})",
            strongest.symbol.trim().to_uppercase(),
            strongest.prediction
        ));
    }

    if low_confidence_majority(predictions) {
        events.push("Most model signals are low confidence".to_string());
    }
    events
}

pub fn market_context(predictions: &[ModelPrediction]) -> MarketContext {
    MarketContext {
        sentiment: sentiment(predictions),
        volatility: volatility(predictions),
        trend: trend(predictions),
        key_events: key_events(predictions),
    }
}

/// High-confidence predictions with a clear direction.
pub fn opportunities(predictions: &[ModelPrediction]) -> Vec<TradingOpportunity> {
    usable(predictions)
        .filter(|p| p.confidence > OPPORTUNITY_MIN_CONFIDENCE)
        .filter_map(|p| {
            let confidence_pct = p.confidence * 100.0;
            let (kind, reasoning, risk_level) = if p.prediction > STRONG_SIGNAL_THRESHOLD {
                (
                    OpportunityKind::Momentum,
                    format!("Strong bullish signal with {:.1}% confidence", confidence_pct),
                    Level::Medium,
                )
            } else if p.prediction > SIGNAL_THRESHOLD {
                (
                    OpportunityKind::DipBuying,
                    format!("Moderate bullish signal with {:.1}% confidence", confidence_pct),
                    Level::Low,
                )
            } else if p.prediction < -STRONG_SIGNAL_THRESHOLD {
                (
                    OpportunityKind::MeanReversion,
                    format!("Strong bearish signal with {:.1}% confidence", confidence_pct),
                    Level::High,
                )
            } else if p.prediction < -SIGNAL_THRESHOLD {
                (
                    OpportunityKind::Breakout,
                    format!("Moderate bearish signal with {:.1}% confidence", confidence_pct),
                    Level::Medium,
                )
            } else {
                return None;
            };

            Some(TradingOpportunity {
                symbol: p.symbol.trim().to_uppercase(),
                kind,
                confidence: p.confidence,
                reasoning,
                risk_level,
                time_horizon: OPPORTUNITY_HORIZON.to_string(),
            })
        })
        .collect()
}

/// Share of `positions` held by the most common sector among `sectors`.
fn max_sector_weight(positions: usize, sectors: &[String]) -> f64 {
    if positions == 0 {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sector in sectors {
        *counts.entry(sector.as_str()).or_default() += 1;
    }
    counts.values().copied().max().unwrap_or(0) as f64 / positions as f64
}

pub fn risk_factors(
    symbols: &[String],
    sectors: &[String],
    predictions: &[ModelPrediction],
    context: &MarketContext,
) -> Vec<RiskFactor> {
    let mut risks = Vec::new();

    if context.volatility == Level::High {
        risks.push(RiskFactor {
            factor: "High Market Volatility".to_string(),
            impact: Level::High,
            description: "Model signals disagree sharply, which raises trading risk".to_string(),
            mitigation: "Use smaller position sizes and tighter stop-losses".to_string(),
        });
    }

    if symbols.len() < MIN_DIVERSIFIED_POSITIONS {
        risks.push(RiskFactor {
            factor: "Portfolio Concentration".to_string(),
            impact: Level::Medium,
            description: "Limited diversification increases portfolio risk".to_string(),
            mitigation: "Consider adding more positions across different sectors".to_string(),
        });
    }

    if low_confidence_majority(predictions) {
        risks.push(RiskFactor {
            factor: "Low Prediction Confidence".to_string(),
            impact: Level::Medium,
            description: "Many predictions have low confidence levels".to_string(),
            mitigation: "Wait for higher confidence signals or reduce position sizes".to_string(),
        });
    }

    if max_sector_weight(symbols.len(), sectors) > MAX_SECTOR_WEIGHT {
        risks.push(RiskFactor {
            factor: "Sector Concentration".to_string(),
            impact: Level::Medium,
            description: "High concentration in a single sector".to_string(),
            mitigation: "Diversify across multiple sectors".to_string(),
        });
    }

    risks
}

pub fn action_items(
    context: &MarketContext,
    opportunities: &[TradingOpportunity],
    risks: &[RiskFactor],
) -> Vec<ActionItem> {
    let mut items = Vec::new();

    if opportunities.len() > 3 {
        items.push(ActionItem {
            action: "Diversify portfolio across multiple opportunities".to_string(),
            reasoning: "Multiple high-confidence signals available".to_string(),
            priority: Level::High,
            timeframe: "immediate".to_string(),
        });
    }

    let high_impact = risks.iter().filter(|r| r.impact == Level::High).count();
    if high_impact > 0 {
        items.push(ActionItem {
            action: "Implement strict risk management".to_string(),
            reasoning: format!("{} high-impact risk factors identified", high_impact),
            priority: Level::High,
            timeframe: "immediate".to_string(),
        });
    }

    if context.volatility == Level::High {
        items.push(ActionItem {
            action: "Reduce position sizes due to high volatility".to_string(),
            reasoning: "Market volatility is elevated".to_string(),
            priority: Level::Medium,
            timeframe: "ongoing".to_string(),
        });
    }

    if context.sentiment == Sentiment::Bearish {
        items.push(ActionItem {
            action: "Consider defensive positioning".to_string(),
            reasoning: "Overall market sentiment is bearish".to_string(),
            priority: Level::Medium,
            timeframe: "1-2 weeks".to_string(),
        });
    }

    items
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::High => "high",
        Level::Medium => "medium",
        Level::Low => "low",
    }
}

fn sentiment_name(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Bullish => "bullish",
        Sentiment::Bearish => "bearish",
        Sentiment::Neutral => "neutral",
    }
}

pub fn reasoning(
    context: &MarketContext,
    opportunities: &[TradingOpportunity],
    risks: &[RiskFactor],
) -> String {
    let mut parts = vec![format!(
        "Market analysis shows {} sentiment with {} volatility levels.",
        sentiment_name(context.sentiment),
        level_name(context.volatility)
    )];

    if !opportunities.is_empty() {
        let strong = opportunities
            .iter()
            .filter(|o| o.confidence > HIGH_CONFIDENCE)
            .count();
        parts.push(format!(
            "Identified {} trading opportunities, including {} high-confidence signals.",
            opportunities.len(),
            strong
        ));
    }

    if !risks.is_empty() {
        let high_impact = risks.iter().filter(|r| r.impact == Level::High).count();
        parts.push(format!(
            "Identified {} risk factors, including {} high-impact risks.",
            risks.len(),
            high_impact
        ));
    }

    parts.push(
        match context.sentiment {
            Sentiment::Bullish if opportunities.len() > 2 => {
                "Overall assessment suggests favorable trading conditions with multiple opportunities."
            }
            Sentiment::Bearish => "Market conditions suggest caution and defensive positioning.",
            _ => "Mixed market conditions require careful position selection and risk management.",
        }
        .to_string(),
    );

    parts.join(" ")
}

/// Full analysis for already-normalized `symbols`.
///
/// `sectors` holds the known sector of each symbol that has one.
pub fn build_analysis(
    symbols: &[String],
    sectors: &[String],
    predictions: &[ModelPrediction],
    now: DateTime<Utc>,
) -> MarketAnalysis {
    let context = market_context(predictions);
    let opportunities = opportunities(predictions);
    let risks = risk_factors(symbols, sectors, predictions, &context);
    let items = action_items(&context, &opportunities, &risks);
    let reasoning = reasoning(&context, &opportunities, &risks);

    MarketAnalysis::new(
        DetailedAnalysis {
            market_context: context,
            opportunities,
            risk_factors: risks,
            recommendations: items,
        },
        reasoning,
        now,
    )
}

/// Stable digest of everything that shapes an analysis, for its cache key.
///
/// Predictions are compared at four decimal places.
pub fn request_fingerprint(symbols: &[String], request: &AnalysisRequest) -> String {
    let mut hasher = DefaultHasher::new();
    symbols.hash(&mut hasher);
    request.analysis_type.hash(&mut hasher);
    for p in &request.rl_predictions {
        p.symbol.trim().to_uppercase().hash(&mut hasher);
        ((p.prediction * 10_000.0).round() as i64).hash(&mut hasher);
        ((p.confidence * 10_000.0).round() as i64).hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}
