//! Market data models
//!
//! Payload types returned by the data access layer and cached as JSON:
//! - `quote` - Real-time quotes (StockQuote) and price history bars (PriceBar)
//! - `profile` - Company profile data (CompanyInfo)
//! - `news` - News headlines (NewsItem)
//! - `options` - Option contracts and chains
//! - `analysis` - Generated outputs (trade and options recommendations, sector performance)
//! - `insight` - Portfolio-level market analysis built from model predictions

mod analysis;
mod insight;
mod news;
mod options;
mod profile;
mod quote;

pub use analysis::{
    OptionsRecommendation, OptionsStrategy, SectorPerformance, Signal, TradeRecommendation,
};
pub use insight::{
    ActionItem, AnalysisRequest, DetailedAnalysis, Level, MarketAnalysis, MarketContext,
    ModelPrediction, OpportunityKind, RiskFactor, Sentiment, TradingOpportunity, Trend,
};
pub use news::NewsItem;
pub use options::{OptionChain, OptionContract, OptionKind};
pub use profile::CompanyInfo;
pub use quote::{PriceBar, StockQuote};
