//! AlphaSphere Market Data Crate
//!
//! Cached, rate-limited access to upstream financial data for the AlphaSphere
//! proxy server.
//!
//! # Overview
//!
//! - Quotes, company profiles, price history and sector performance
//! - News headlines with a placeholder fallback
//! - Option expirations and chains, with a synthetic chain when live data is down
//! - SMA crossover trade signals and a matching options strategy
//!
//! # Architecture
//!
//! ```text
//! +---------------------+
//! |  MarketDataService  |  (cache-or-fetch, degraded results)
//! +---------------------+
//!        |         |
//!        v         v
//! +-----------+  +---------------------------+
//! | CacheStore|  | RateGate + run_with_retry |
//! +-----------+  +---------------------------+
//!        |                    |
//!        v                    v
//!  cache.json        +--------------------+
//!                    | MarketDataProvider |  (Yahoo Finance)
//!                    +--------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataService`] - Entry point for every data operation
//! - [`CacheStore`] - TTL cache persisted as a JSON snapshot
//! - [`RateGate`] - Minimum spacing between calls to one source
//! - [`MarketDataProvider`] - Upstream fetch trait

pub mod cache;
pub mod errors;
pub mod models;
pub mod provider;
pub mod resilience;
pub mod service;

pub use cache::{
    CacheConfig, CacheJanitor, CacheStatus, CacheStore, Category, CategoryTtls, JanitorHandle,
};
pub use errors::{CacheError, MarketDataError};
pub use models::{
    AnalysisRequest, CompanyInfo, MarketAnalysis, ModelPrediction, NewsItem, OptionChain,
    OptionContract, OptionKind, OptionsRecommendation, OptionsStrategy, PriceBar,
    SectorPerformance, Signal, StockQuote, TradeRecommendation,
};
pub use provider::yahoo::YahooProvider;
pub use provider::MarketDataProvider;
pub use resilience::{RateGate, RetryPolicy};
pub use service::{MarketDataConfig, MarketDataService};
